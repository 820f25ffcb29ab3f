//! Local model runtime transport.
//!
//! Runs `<binary> run <model>` and writes the prompt to the child's stdin.
//! The prompt never appears on a command line and no shell is involved.

use crate::ModelBackend;
use async_trait::async_trait;
use copilot_core::ModelError;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const TRANSPORT: &str = "process";

/// Secondary transport driving the model runtime as a child process.
#[derive(Debug, Clone)]
pub struct ProcessBackend {
    binary: String,
    args: Vec<String>,
}

impl ProcessBackend {
    /// `<binary> run <model>`, the model runtime's one-shot CLI.
    pub fn new(binary: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            args: vec!["run".to_string(), model.into()],
        }
    }

    /// Arbitrary command; the prompt is still delivered on stdin.
    pub fn with_command(binary: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            binary: binary.into(),
            args,
        }
    }
}

#[async_trait]
impl ModelBackend for ProcessBackend {
    fn transport(&self) -> &str {
        TRANSPORT
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let mut child = Command::new(&self.binary)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                let reason = format!("failed to spawn {}: {}", self.binary, e);
                ModelError::unavailable(TRANSPORT, reason)
            })?;

        // Feed stdin while stdout drains so neither pipe fills up.
        let stdin = child.stdin.take();
        let feed = async move {
            match stdin {
                Some(mut stdin) => stdin.write_all(prompt.as_bytes()).await,
                None => Ok(()),
            }
        };
        let (fed, output) = tokio::join!(feed, child.wait_with_output());

        let output = output.map_err(|e| {
            ModelError::unavailable(TRANSPORT, format!("failed to read output: {}", e))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ModelError::unavailable(
                TRANSPORT,
                format!("{} exited with {}: {}", self.binary, output.status, stderr.trim()),
            ));
        }

        // A child may exit successfully without reading the whole prompt.
        match fed {
            Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                return Err(ModelError::unavailable(
                    TRANSPORT,
                    format!("failed to write prompt: {}", e),
                ));
            }
            _ => {}
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
