//! Ollama HTTP transport

use super::ndjson::decode_chunks;
use super::types::{GenerateChunk, GenerateRequest, ListModelsResponse};
use crate::{ChunkStream, ModelBackend};
use async_trait::async_trait;
use copilot_core::{ConfigError, CopilotResult, GatewayConfig, HealthCheck, ModelError};
use reqwest::Client;
use std::time::{Duration, Instant};

const TRANSPORT: &str = "http";
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for `POST /api/generate` and `GET /api/tags`.
#[derive(Clone)]
pub struct OllamaHttpBackend {
    client: Client,
    base_url: String,
    model: String,
}

impl OllamaHttpBackend {
    /// Create a backend from gateway configuration.
    ///
    /// # Errors
    /// `ConfigError::InvalidValue` if the HTTP client cannot be built.
    pub fn new(config: &GatewayConfig) -> CopilotResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "http client".to_string(),
                value: config.endpoint.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self::with_client(client, &config.endpoint, &config.model))
    }

    /// Create a backend around an existing client.
    ///
    /// # Arguments
    /// * `base_url` - Server URL (e.g., "http://localhost:11434")
    /// * `model` - Model name (e.g., "mistral:7b")
    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    async fn post_generate(
        &self,
        prompt: &str,
        stream: bool,
    ) -> Result<reqwest::Response, ModelError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream,
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::unavailable(TRANSPORT, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ModelError::unavailable(
                TRANSPORT,
                format!("status {}: {}", status.as_u16(), body.trim()),
            ));
        }
        Ok(response)
    }

    /// Names of models the server has pulled.
    pub async fn list_models(&self) -> Result<Vec<String>, ModelError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| ModelError::unavailable(TRANSPORT, format!("failed to connect: {}", e)))?;

        if !response.status().is_success() {
            return Err(ModelError::unavailable(
                TRANSPORT,
                format!("status {}", response.status().as_u16()),
            ));
        }

        let list: ListModelsResponse =
            response.json().await.map_err(|e| ModelError::InvalidResponse {
                transport: TRANSPORT.to_string(),
                reason: format!("failed to parse models list: {}", e),
            })?;
        Ok(list.models.into_iter().map(|m| m.name).collect())
    }
}

#[async_trait]
impl ModelBackend for OllamaHttpBackend {
    fn transport(&self) -> &str {
        TRANSPORT
    }

    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let response = self.post_generate(prompt, false).await?;
        let chunk: GenerateChunk = response.json().await.map_err(|e| ModelError::InvalidResponse {
            transport: TRANSPORT.to_string(),
            reason: format!("failed to parse response: {}", e),
        })?;
        match chunk.error {
            Some(error) => Err(ModelError::unavailable(TRANSPORT, error)),
            None => Ok(chunk.response),
        }
    }

    async fn open_stream(&self, prompt: &str) -> Result<ChunkStream, ModelError> {
        let response = self.post_generate(prompt, true).await?;
        Ok(decode_chunks(response.bytes_stream(), TRANSPORT))
    }

    async fn health_check(&self) -> HealthCheck {
        let started = Instant::now();
        let result = self.list_models().await;
        let elapsed = started.elapsed().as_millis() as i64;
        match result {
            Ok(models) if models.iter().any(|m| m.contains(&self.model)) => {
                HealthCheck::healthy("model").with_response_time(elapsed)
            }
            Ok(models) => HealthCheck::degraded(
                "model",
                format!("server reachable but model {} is not pulled", self.model),
            )
            .with_response_time(elapsed)
            .with_metadata("available", serde_json::json!(models)),
            Err(e) => HealthCheck::unhealthy("model", e.to_string()).with_response_time(elapsed),
        }
    }
}

impl std::fmt::Debug for OllamaHttpBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaHttpBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
