use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

use storebot_core::config::LlmConfig;

use crate::{CompletionRequest, LlmClient};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI-compatible `chat/completions` client. One instance is built at
/// process start and shared by all three model-backed components.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    model: String,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .context("could not build llm http client")?;

        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self { http, base_url, api_key: config.api_key.clone(), model: config.model.clone() })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|message| json!({ "role": message.role.as_str(), "content": message.content }))
            .collect();

        let payload = json!({
            "model": self.model,
            "messages": messages,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let mut http_request =
            self.http.post(format!("{}/chat/completions", self.base_url)).json(&payload);
        if let Some(api_key) = &self.api_key {
            http_request = http_request.bearer_auth(api_key.expose_secret());
        }

        let response = http_request.send().await.context("llm request failed")?;
        let status = response.status();
        let body = response.text().await.context("llm response body unreadable")?;

        let data: Value = serde_json::from_str(&body)
            .with_context(|| format!("llm returned non-JSON response (status {status})"))?;

        if let Some(error) = data.get("error") {
            let message =
                error.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(anyhow!("llm api error: {message}"));
        }
        if !status.is_success() {
            return Err(anyhow!("llm api returned status {status}"));
        }

        data.get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| anyhow!("llm response missing choices[0].message.content"))
    }
}

#[cfg(test)]
mod tests {
    use storebot_core::config::{LlmConfig, LlmProvider};
    use storebot_core::context::{ChatMessage, ChatRole};

    use super::OpenAiClient;
    use crate::{CompletionRequest, LlmClient};

    fn config(base_url: String) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some(base_url),
            model: "test-model".to_string(),
            timeout_secs: 5,
        }
    }

    fn request() -> CompletionRequest {
        CompletionRequest {
            messages: vec![ChatMessage { role: ChatRole::User, content: "hi".to_string() }],
            max_tokens: 50,
            temperature: 0.1,
        }
    }

    #[tokio::test]
    async fn extracts_content_from_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello there"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiClient::from_config(&config(server.url())).expect("client");
        let text = client.complete(request()).await.expect("completion");

        assert_eq!(text, "hello there");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn api_error_objects_become_errors() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_header("content-type", "application/json")
            .with_body(r#"{"error":{"message":"rate limited"}}"#)
            .create_async()
            .await;

        let client = OpenAiClient::from_config(&config(server.url())).expect("client");
        let error = client.complete(request()).await.err().expect("should fail");
        assert!(error.to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn non_json_body_becomes_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/chat/completions")
            .with_status(502)
            .with_body("<html>bad gateway</html>")
            .create_async()
            .await;

        let client = OpenAiClient::from_config(&config(server.url())).expect("client");
        assert!(client.complete(request()).await.is_err());
    }
}
