//! OpenAI-compatible chat completions client
//!
//! Works against any endpoint speaking the `/chat/completions` protocol.
//! Defaults target Groq with `llama-3.3-70b-versatile`.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use viewlineage_core::OracleSettings;

use crate::transport::{Completion, CompletionRequest, OracleCredential, OracleError, TextOracle};

/// Chat completions HTTP client
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

impl ChatCompletionsClient {
    /// Build a client from the `[oracle]` configuration section
    pub fn from_settings(settings: &OracleSettings) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| OracleError::Request(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            timeout_secs: settings.timeout_secs,
        })
    }

    /// Create with default settings and a specific model
    pub fn with_model(model: &str) -> Result<Self, OracleError> {
        let settings = OracleSettings {
            model: model.to_string(),
            ..OracleSettings::default()
        };
        Self::from_settings(&settings)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn request_body(&self, request: &CompletionRequest) -> serde_json::Value {
        serde_json::json!({
            "model": &self.model,
            "messages": &request.messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
            "top_p": request.top_p,
            "stream": false
        })
    }

    fn map_send_error(&self, err: reqwest::Error) -> OracleError {
        if err.is_timeout() {
            OracleError::Timeout(self.timeout_secs)
        } else {
            OracleError::Request(err.to_string())
        }
    }
}

/// Extract text and token usage from a raw response body
fn parse_response(body: &str) -> Result<Completion, OracleError> {
    let api_response: ApiResponse = serde_json::from_str(body)
        .map_err(|e| OracleError::InvalidResponse(format!("Failed to parse completion: {}", e)))?;

    let text = api_response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| OracleError::InvalidResponse("Oracle returned no choices".to_string()))?;

    Ok(Completion {
        text: text.trim().to_string(),
        tokens_used: api_response.usage.map(|u| u.total_tokens).unwrap_or(0),
    })
}

#[async_trait]
impl TextOracle for ChatCompletionsClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, credential: &OracleCredential, request: &CompletionRequest) -> Result<Completion, OracleError> {
        if credential.is_empty() {
            return Err(OracleError::MissingCredential("empty API key".to_string()));
        }

        tracing::debug!(model = %self.model, messages = request.messages.len(), "sending completion request");

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(credential.expose())
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(OracleError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let completion = parse_response(&body)?;
        tracing::debug!(tokens = completion.tokens_used, "completion received");
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChatMessage;

    #[test]
    fn endpoint_and_body() {
        let settings = OracleSettings {
            base_url: "https://api.groq.com/openai/v1/".to_string(),
            ..OracleSettings::default()
        };
        let client = ChatCompletionsClient::from_settings(&settings).unwrap();
        assert_eq!(client.endpoint(), "https://api.groq.com/openai/v1/chat/completions");
        assert_eq!(client.model(), "llama-3.3-70b-versatile");

        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]).with_max_tokens(16);
        let body = client.request_body(&request);
        assert_eq!(body["model"], "llama-3.3-70b-versatile");
        assert_eq!(body["max_tokens"], 16);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn parses_text_and_usage() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "  1. D.S.T\n"}}],
            "usage": {"prompt_tokens": 90, "completion_tokens": 8, "total_tokens": 98}
        }"#;
        let completion = parse_response(body).unwrap();
        assert_eq!(completion.text, "1. D.S.T");
        assert_eq!(completion.tokens_used, 98);
    }

    #[test]
    fn missing_usage_counts_zero() {
        let body = r#"{"choices": [{"message": {"content": "x"}}]}"#;
        assert_eq!(parse_response(body).unwrap().tokens_used, 0);
    }

    #[test]
    fn rejects_empty_choices() {
        let result = parse_response(r#"{"choices": []}"#);
        assert!(matches!(result, Err(OracleError::InvalidResponse(_))));

        let result = parse_response("not json");
        assert!(matches!(result, Err(OracleError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn empty_credential_fails_before_sending() {
        let client = ChatCompletionsClient::with_model("test-model").unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let result = client.complete(&OracleCredential::new(""), &request).await;
        assert!(matches!(result, Err(OracleError::MissingCredential(_))));
    }
}
