//! Category templates and the read-only set loaded at startup.
//!
//! The category file is YAML shaped as
//!
//! ```yaml
//! categories:
//!   database_down:
//!     prompt: "Check the connection pool on {{agent}}"
//!     hints: "Postgres 15 behind pgbouncer"
//!     metadata: { team: dba }
//! ```

use crate::{ConfigError, CopilotError, CopilotResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Prompt template for one incident category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CategoryTemplate {
    pub name: String,
    pub prompt_template: String,
    /// Extra context rendered into the prompt after the template
    pub hints: Option<String>,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub metadata: Option<serde_json::Value>,
}

impl CategoryTemplate {
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            hints: None,
            metadata: None,
        }
    }

    pub fn with_hints(mut self, hints: impl Into<String>) -> Self {
        self.hints = Some(hints.into());
        self
    }
}

#[derive(Debug, Deserialize)]
struct CategoryFile {
    #[serde(default)]
    categories: Option<BTreeMap<String, CategoryEntry>>,
}

#[derive(Debug, Deserialize)]
struct CategoryEntry {
    #[serde(alias = "prompt_template")]
    prompt: String,
    #[serde(default)]
    hints: Option<String>,
    #[serde(default)]
    metadata: Option<serde_json::Value>,
}

/// Immutable mapping from category name to template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategorySet {
    templates: BTreeMap<String, CategoryTemplate>,
}

impl CategorySet {
    /// The "no categories" set: every lookup is an unknown category.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_templates(templates: impl IntoIterator<Item = CategoryTemplate>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    /// Parse the YAML category document.
    pub fn from_yaml_str(source: &str, origin: &str) -> CopilotResult<Self> {
        let file: CategoryFile =
            serde_yaml::from_str(source).map_err(|e| ConfigError::CategoriesUnreadable {
                path: origin.to_string(),
                reason: e.to_string(),
            })?;

        let templates = file
            .categories
            .unwrap_or_default()
            .into_iter()
            .map(|(name, entry)| CategoryTemplate {
                name,
                prompt_template: entry.prompt,
                hints: entry.hints.filter(|h| !h.trim().is_empty()),
                metadata: entry.metadata,
            });

        Ok(Self::from_templates(templates))
    }

    /// Read and parse the category file.
    ///
    /// # Errors
    ///
    /// `ConfigError::CategoriesUnreadable` if the file cannot be read or is not
    /// a valid category document.
    pub fn load(path: impl AsRef<Path>) -> CopilotResult<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let source =
            std::fs::read_to_string(path).map_err(|e| ConfigError::CategoriesUnreadable {
                path: origin.clone(),
                reason: e.to_string(),
            })?;
        Self::from_yaml_str(&source, &origin)
    }

    /// Resolve a category name.
    ///
    /// # Errors
    ///
    /// `CopilotError::UnknownCategory` carrying the known names.
    pub fn get(&self, name: &str) -> CopilotResult<&CategoryTemplate> {
        self.templates
            .get(name)
            .ok_or_else(|| CopilotError::UnknownCategory {
                category: name.to_string(),
                known: self.names(),
            })
    }

    /// Category names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CategoryTemplate> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}
