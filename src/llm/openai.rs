//! OpenAI-compatible `/v1/chat/completions` backend

use std::path::Path;

use serde::Deserialize;

use super::client::CompletionService;
use super::messages::{ChatMessage, CompletionError};

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Client for OpenAI-style chat completion endpoints
#[derive(Clone)]
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiClient {
    /// Create a new client
    ///
    /// # Arguments
    /// * `base_url` - Server root without the `/v1/...` path (e.g., "https://api.openai.com")
    /// * `api_key` - Bearer token
    /// * `model` - Model name (e.g., "gpt-3.5-turbo")
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

impl CompletionService for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, CompletionError> {
        let endpoint = format!("{}/v1/chat/completions", self.base_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": max_tokens,
        });

        let response = self
            .client
            .post(&endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)?;
        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

/// Read an API key from `path`, falling back to `OPENAI_API_KEY`.
pub fn load_api_key(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .or_else(|| {
            std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|key| key.trim().to_string())
                .filter(|key| !key.is_empty())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_returns_first_choice_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "max_tokens": 50,
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "hello"}}]
            })))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(server.uri(), "sk-test", DEFAULT_OPENAI_MODEL);
        let text = client.complete(&[ChatMessage::user("hi")], 50).await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = OpenAiClient::new(server.uri(), "sk-test", DEFAULT_OPENAI_MODEL);
        let err = client.complete(&[ChatMessage::user("hi")], 50).await.unwrap_err();
        assert!(matches!(err, CompletionError::Status { status: 429, .. }));
    }

    #[test]
    fn test_load_api_key_trims_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let key_path = dir.path().join("apikey.txt");
        std::fs::write(&key_path, "  sk-abc\n").unwrap();
        assert_eq!(load_api_key(&key_path).as_deref(), Some("sk-abc"));
    }
}
