//! Copilot Context - Prompt Assembly
//!
//! Renders the instruction prompt sent to the model for one incident report.
//! Rendering is a pure function of the category template and the report.

use copilot_core::{CategorySet, CategoryTemplate, ConfigError, CopilotResult, IncidentReport};

// ============================================================================
// PLACEHOLDERS
// ============================================================================

/// Keys a category prompt may reference.
pub const CATEGORY_PLACEHOLDERS: &[&str] = &["category", "agent", "incident", "hints"];

/// Keys the outer envelope may reference.
pub const ENVELOPE_PLACEHOLDERS: &[&str] = &["category", "agent", "incident", "context"];

/// Fixed instruction envelope asking for the six-field JSON object.
pub const DEFAULT_ENVELOPE: &str = r#"You are an AI Incident Copilot.
Category: {{category}}
Agent: {{agent}}
Incident: {{incident}}

Additional context:
{{context}}

Your task:
Return ONLY valid JSON with exactly these fields:
- investigation_steps (list of the top 3 investigation steps)
- commands (list of CLI commands, they will not be executed)
- fixes (list of recommended fixes)
- severity (one of: low, medium, high, critical)
- recommended_action (short label for the next action)
- notes (free text)

Example format:
{
  "investigation_steps": ["step1", "step2"],
  "commands": ["command1", "command2"],
  "fixes": ["fix1", "fix2"],
  "severity": "high",
  "recommended_action": "restart service",
  "notes": "why"
}

Do not add extra text outside JSON.
If unsure, still return generic investigation steps, commands, and fixes."#;

/// A `{{name}}` occurrence inside a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placeholder<'a> {
    /// Byte range of the whole `{{ name }}` token
    pub start: usize,
    pub end: usize,
    /// Trimmed key
    pub key: &'a str,
}

/// Scan `template` for `{{key}}` tokens, left to right, non-overlapping.
/// Keys are trimmed; `{{ agent }}` and `{{agent}}` are the same placeholder.
pub fn placeholders(template: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut cursor = 0;
    while let Some(open) = template[cursor..].find("{{") {
        let start = cursor + open;
        let Some(close) = template[start + 2..].find("}}") else {
            break;
        };
        let end = start + 2 + close + 2;
        let key = template[start + 2..end - 2].trim();
        if is_key(key) {
            found.push(Placeholder { start, end, key });
            cursor = end;
        } else {
            // Not a placeholder (e.g. a literal JSON brace pair); move past the opener.
            cursor = start + 1;
        }
    }
    found
}

fn is_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Substitute placeholders in a single pass. Substituted values are never
/// rescanned, so incident text containing `{{...}}` is inserted verbatim.
/// Keys without a value are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let extra: usize = values.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut last = 0;
    for ph in placeholders(template) {
        if let Some((_, value)) = values.iter().find(|(k, _)| *k == ph.key) {
            out.push_str(&template[last..ph.start]);
            out.push_str(value);
            last = ph.end;
        }
    }
    out.push_str(&template[last..]);
    out
}

/// Check every placeholder in `template` against `allowed`.
fn check_template(name: &str, template: &str, allowed: &[&str]) -> CopilotResult<()> {
    match placeholders(template)
        .into_iter()
        .find(|ph| !allowed.contains(&ph.key))
    {
        Some(ph) => Err(ConfigError::UnknownPlaceholder {
            category: name.to_string(),
            placeholder: ph.key.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Rough token estimate used for prompt-size logging.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

// ============================================================================
// PROMPT BUILDER
// ============================================================================

/// Builds model prompts from a category template and an incident report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptBuilder {
    envelope: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            envelope: DEFAULT_ENVELOPE.to_string(),
        }
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom envelope.
    ///
    /// # Errors
    ///
    /// `ConfigError::UnknownPlaceholder` if the envelope references a key
    /// outside [`ENVELOPE_PLACEHOLDERS`].
    pub fn with_envelope(envelope: impl Into<String>) -> CopilotResult<Self> {
        let envelope = envelope.into();
        check_template("<envelope>", &envelope, ENVELOPE_PLACEHOLDERS)?;
        Ok(Self { envelope })
    }

    /// Validate every category prompt once at startup, so a bad template
    /// fails the process instead of a request.
    pub fn check_categories(&self, categories: &CategorySet) -> CopilotResult<()> {
        for template in categories.iter() {
            check_template(&template.name, &template.prompt_template, CATEGORY_PLACEHOLDERS)?;
        }
        Ok(())
    }

    /// Render the category section: the category prompt followed by its hints.
    pub fn render_context(&self, template: &CategoryTemplate, report: &IncidentReport) -> String {
        let hints = template.hints.as_deref().unwrap_or("");
        let mut context = render(
            &template.prompt_template,
            &[
                ("category", report.category.as_str()),
                ("agent", report.agent_identifier.as_str()),
                ("incident", report.raw_text.as_str()),
                ("hints", hints),
            ],
        );
        let hints_inline = placeholders(&template.prompt_template)
            .iter()
            .any(|ph| ph.key == "hints");
        if !hints.is_empty() && !hints_inline {
            if !context.is_empty() {
                context.push_str("\n\n");
            }
            context.push_str("Hints: ");
            context.push_str(hints);
        }
        context
    }

    /// Build the full prompt. Deterministic and total.
    pub fn build(&self, template: &CategoryTemplate, report: &IncidentReport) -> String {
        let context = self.render_context(template, report);
        render(
            &self.envelope,
            &[
                ("category", report.category.as_str()),
                ("agent", report.agent_identifier.as_str()),
                ("incident", report.raw_text.as_str()),
                ("context", context.as_str()),
            ],
        )
    }
}
