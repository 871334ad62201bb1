//! Chat endpoint provider.
//!
//! Speaks the non-streaming `POST {endpoint}/api/chat` protocol served by
//! Ollama and compatible local runtimes:
//!
//! - request: `{model, messages: [{role, content}], stream: false}`
//! - response: `{message: {content}}` on success, `{error}` on failure
//!
//! A populated `error` field is a failure even when the status is 200.

use actloop_core::error::ProviderError;
use actloop_core::message::{Message, Role};
use actloop_core::provider::{Provider, ProviderRequest, ProviderResponse};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default per-request timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// A provider for `/api/chat` endpoints.
pub struct OllamaProvider {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl OllamaProvider {
    /// Create a provider for the given endpoint base URL.
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                reqwest::Client::new()
            });

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        }
    }

    /// Create a provider for a local runtime on the default port.
    pub fn local() -> Self {
        Self::new("http://localhost:11434", DEFAULT_TIMEOUT_SECS)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    /// Convert our Message types to wire format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| ApiMessage {
                role: m.role.as_str().to_string(),
                content: m.content.clone(),
            })
            .collect()
    }

    fn build_body(request: &ProviderRequest) -> ApiRequest {
        ApiRequest {
            model: request.model.clone(),
            messages: Self::to_api_messages(&request.messages),
            stream: false,
            options: request.temperature.map(|temperature| ApiOptions { temperature }),
        }
    }

    /// Turn a status code and raw body into a response or a failure.
    fn interpret(
        status: u16,
        body: &str,
        requested_model: &str,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let parsed: Result<ApiResponse, _> = serde_json::from_str(body);

        if let Ok(ApiResponse {
            error: Some(error), ..
        }) = &parsed
        {
            return Err(ProviderError::ModelError(error.clone()));
        }

        if !(200..300).contains(&status) {
            return Err(ProviderError::ApiError {
                status_code: status,
                message: body.to_string(),
            });
        }

        let api_response = parsed
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        let content = api_response
            .message
            .map(|m| m.content)
            .ok_or_else(|| ProviderError::InvalidResponse("Response has no message".into()))?;

        Ok(ProviderResponse {
            message: Message {
                id: uuid::Uuid::new_v4().to_string(),
                role: Role::Assistant,
                content,
                timestamp: chrono::Utc::now(),
            },
            model: api_response
                .model
                .unwrap_or_else(|| requested_model.to_string()),
        })
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "Sending chat request"
        );

        let response = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                ProviderError::Network(e.to_string())
            }
        })?;

        let result = Self::interpret(status, &text, &request.model);
        if let Err(e) = &result {
            warn!(status, error = %e, "Chat endpoint returned an error");
        }
        result
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ApiMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ApiOptions>,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ApiMessage>,
    #[serde(default)]
    error: Option<String>,
}
