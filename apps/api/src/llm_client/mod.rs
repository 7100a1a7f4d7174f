/// LLM Client — every chat-completion call in the tailor goes through this module.
///
/// Speaks the OpenAI chat-completions contract, so any compatible endpoint works
/// (OpenAI itself, self-hosted gateways, local servers).
///
/// One call to [`ChatModel::complete`] issues exactly one HTTP request. Retries,
/// backoff and deadlines are the caller's business; the client only observes the
/// cancellation token it is handed.
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::models::ProviderSettings;

pub mod cache;
#[cfg(test)]
pub mod mock;

pub use cache::ClientCache;

const COMPLETIONS_PATH: &str = "/chat/completions";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    #[error("the request timed out")]
    Timeout,

    #[error("authentication with the provider failed (HTTP {status}): {message}")]
    AuthenticationFailed { status: u16, message: String },

    #[error("the provider is rate limiting requests: {0}")]
    RateLimited(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("the provider rejected the request (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("the model returned an empty response")]
    EmptyResponse,
}

impl LlmError {
    /// Whether repeating the same request can reasonably succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::Timeout
                | LlmError::RateLimited(_)
                | LlmError::Transport(_)
                | LlmError::EmptyResponse
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Body of a chat-completions request, serialized as-is onto the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Size of the JSON body that would be sent.
    pub fn body_size(&self) -> usize {
        serde_json::to_vec(self).map(|body| body.len()).unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: Option<CompletionMessage>,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    error: ProviderErrorBody,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    message: String,
}

/// A chat model that turns one request into one raw text answer.
///
/// Implementations must stop work once `cancel` fires and return [`LlmError::Timeout`].
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    completions_url: String,
}

impl LlmClient {
    pub fn new(settings: &ProviderSettings) -> Result<Self, LlmError> {
        let settings = settings.normalized();
        let client = Client::builder()
            .build()
            .map_err(|e| LlmError::Transport(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key: settings.api_key,
            completions_url: completions_url(&settings.endpoint),
        })
    }

    async fn send(&self, request: &ChatRequest) -> Result<String, LlmError> {
        debug!(
            "Sending chat completion: model={}, body_bytes={}",
            request.model,
            request.body_size()
        );

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| LlmError::Transport(e.to_string()))?;

        let status = response.status().as_u16();

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ProviderError>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("LLM provider returned {status}: {message}");

            return Err(match status {
                401 | 403 => LlmError::AuthenticationFailed { status, message },
                429 => LlmError::RateLimited(message),
                408 | 500..=599 => LlmError::Transport(format!("HTTP {status}: {message}")),
                _ => LlmError::Api { status, message },
            });
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Transport(format!("invalid response body: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)?;

        debug!("Chat completion succeeded: {} chars", content.len());
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<String, LlmError> {
        // Dropping the losing `send` future aborts the in-flight request.
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(LlmError::Timeout),
            result = self.send(request) => result,
        }
    }
}

/// Accepts either a base URL (`…/v1`) or a full completions URL.
fn completions_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.ends_with(COMPLETIONS_PATH) {
        endpoint.to_string()
    } else {
        format!("{endpoint}{COMPLETIONS_PATH}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> LlmClient {
        LlmClient::new(&ProviderSettings {
            endpoint: format!("{}/v1", server.uri()),
            api_key: "sk-test".to_string(),
            model: "gpt-test".to_string(),
        })
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("hello")],
            temperature: 0.3,
            max_tokens: Some(64),
        }
    }

    async fn respond_with(status: u16, body: serde_json::Value) -> Result<String, LlmError> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&server)
            .await;

        client_for(&server)
            .complete(&request(), CancellationToken::new())
            .await
    }

    #[test]
    fn test_completions_url_from_base_url() {
        assert_eq!(
            completions_url("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_completions_url_already_complete() {
        assert_eq!(
            completions_url("http://localhost:8080/v1/chat/completions"),
            "http://localhost:8080/v1/chat/completions"
        );
    }

    #[test]
    fn test_request_serializes_openai_shape() {
        let body = serde_json::to_value(request()).unwrap();
        assert_eq!(body["model"], "gpt-test");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert_eq!(body["max_tokens"], 64);
    }

    #[test]
    fn test_retry_classes() {
        assert!(LlmError::Timeout.is_retryable());
        assert!(LlmError::RateLimited(String::new()).is_retryable());
        assert!(LlmError::Transport(String::new()).is_retryable());
        assert!(LlmError::EmptyResponse.is_retryable());
        assert!(!LlmError::AuthenticationFailed {
            status: 401,
            message: String::new()
        }
        .is_retryable());
        assert!(!LlmError::Api {
            status: 400,
            message: String::new()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn test_success_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "chatcmpl-1",
                "choices": [{"message": {"role": "assistant", "content": "<GENERATE>x</GENERATE>"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server)
            .complete(&request(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(text, "<GENERATE>x</GENERATE>");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication_failed() {
        let result = respond_with(
            401,
            serde_json::json!({"error": {"message": "Incorrect API key provided"}}),
        )
        .await;
        assert_eq!(
            result,
            Err(LlmError::AuthenticationFailed {
                status: 401,
                message: "Incorrect API key provided".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_authentication_failed() {
        let result = respond_with(403, serde_json::json!({})).await;
        assert!(matches!(
            result,
            Err(LlmError::AuthenticationFailed { status: 403, .. })
        ));
    }

    #[tokio::test]
    async fn test_too_many_requests_maps_to_rate_limited() {
        let result = respond_with(
            429,
            serde_json::json!({"error": {"message": "slow down"}}),
        )
        .await;
        assert_eq!(result, Err(LlmError::RateLimited("slow down".to_string())));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_transport() {
        let result = respond_with(503, serde_json::json!({})).await;
        assert!(matches!(result, Err(LlmError::Transport(_))));
    }

    #[tokio::test]
    async fn test_bad_request_maps_to_api_error() {
        let result = respond_with(
            400,
            serde_json::json!({"error": {"message": "unknown model"}}),
        )
        .await;
        assert_eq!(
            result,
            Err(LlmError::Api {
                status: 400,
                message: "unknown model".to_string()
            })
        );
    }

    #[tokio::test]
    async fn test_blank_content_maps_to_empty_response() {
        let result = respond_with(
            200,
            serde_json::json!({"choices": [{"message": {"content": "   "}}]}),
        )
        .await;
        assert_eq!(result, Err(LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_missing_choices_maps_to_empty_response() {
        let result = respond_with(200, serde_json::json!({"choices": []})).await;
        assert_eq!(result, Err(LlmError::EmptyResponse));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_slow_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"choices": []}))
                    .set_delay(Duration::from_secs(30)),
            )
            .mount(&server)
            .await;

        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            })
        };

        let started = std::time::Instant::now();
        let result = client_for(&server).complete(&request(), cancel).await;
        timer.await.unwrap();

        assert_eq!(result, Err(LlmError::Timeout));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
