//! OpenAI-compatible chat-completions client.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use tidemark_types::{ConvertError, Result};
use tracing::debug;

/// LLM provider configuration. `api_key` absent means the LLM tier is
/// disabled; the orchestrator checks [`LlmClient::is_configured`].
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: None,
            model: "gpt-4o-mini".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.api_key.is_some()
    }

    /// One completion with deterministic parameters (`temperature=0`,
    /// `max_tokens=4096`). Returns the raw assistant text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| ConvertError::LlmFailure("no API key configured".into()))?;

        let body = json!({
            "model": self.config.model,
            "temperature": 0,
            "max_tokens": 4096,
            "messages": [
                ChatMessage { role: "system", content: system },
                ChatMessage { role: "user", content: user },
            ],
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ConvertError::Timeout("llm completion".into())
                } else {
                    ConvertError::LlmFailure(format!("request: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ConvertError::LlmFailure(format!(
                "provider returned {}: {}",
                status.as_u16(),
                detail.chars().take(200).collect::<String>()
            )));
        }

        let payload: ChatResponse = response
            .json()
            .await
            .map_err(|e| ConvertError::LlmFailure(format!("malformed response: {e}")))?;

        let content = payload
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ConvertError::LlmFailure("empty completion".into()))?;

        debug!(model = %self.config.model, chars = content.len(), "llm completion");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base_url: String) -> LlmClient {
        LlmClient::new(LlmConfig {
            base_url,
            api_key: Some("test-key".into()),
            model: "test-model".into(),
            timeout: Duration::from_secs(5),
        })
    }

    #[test]
    fn unconfigured_client_reports_itself() {
        let c = LlmClient::new(LlmConfig::default());
        assert!(!c.is_configured());
    }

    #[tokio::test]
    async fn parses_chat_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{"message": {"role": "assistant", "content": "# Out"}}]
            })))
            .mount(&server)
            .await;

        let out = client(server.uri()).complete("sys", "user").await.unwrap();
        assert_eq!(out, "# Out");
    }

    #[tokio::test]
    async fn provider_error_is_llm_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
            .mount(&server)
            .await;

        let err = client(server.uri()).complete("sys", "user").await.unwrap_err();
        assert!(matches!(err, ConvertError::LlmFailure(_)));
    }
}
