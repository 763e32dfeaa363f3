//! Oracle transport trait and request/response types

use serde::{Deserialize, Serialize};
use std::fmt;

/// API key for the oracle service.
///
/// Owned by a session and passed to every completion call; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct OracleCredential(String);

impl OracleCredential {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Read the key from an environment variable
    pub fn from_env(var: &str) -> Result<Self, OracleError> {
        std::env::var(var)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(Self)
            .ok_or_else(|| OracleError::MissingCredential(format!("{} environment variable not set", var)))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for OracleCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OracleCredential(***)")
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A single-shot, non-streaming completion request
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
}

impl CompletionRequest {
    /// Request with near-deterministic sampling and a 1024 token cap
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: 0.2,
            max_tokens: 1024,
            top_p: 1.0,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Oracle answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Trimmed response text
    pub text: String,

    /// Total tokens billed for the call (0 when not reported)
    pub tokens_used: u64,
}

/// Errors from an oracle transport
#[derive(Debug, Clone, thiserror::Error)]
pub enum OracleError {
    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Oracle API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The transport answered, but the text itself reports a failure
    #[error("Oracle reported failure: {0}")]
    Reported(String),
}

/// Prefix some transports use to report failures inside the response text
pub const FAILURE_MARKER: &str = "Error:";

/// Text completion service
#[async_trait::async_trait]
pub trait TextOracle: Send + Sync {
    /// Name for logs (e.g. the model id)
    fn name(&self) -> &str;

    /// Run one completion
    async fn complete(&self, credential: &OracleCredential, request: &CompletionRequest) -> Result<Completion, OracleError>;

    /// Check that the credential is accepted by sending a trivial prompt
    async fn validate(&self, credential: &OracleCredential) -> Result<(), OracleError> {
        let request = CompletionRequest::new(vec![ChatMessage::user("Hello")]).with_max_tokens(8);
        let completion = self.complete(credential, &request).await?;
        if completion.text.starts_with(FAILURE_MARKER) {
            return Err(OracleError::Reported(completion.text));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_not_printed() {
        let credential = OracleCredential::new("gsk_secret");
        assert_eq!(format!("{:?}", credential), "OracleCredential(***)");
        assert_eq!(credential.expose(), "gsk_secret");
        assert!(OracleCredential::new("  ").is_empty());
    }

    #[test]
    fn missing_env_credential() {
        let result = OracleCredential::from_env("VIEWLINEAGE_TEST_SURELY_UNSET_KEY");
        assert!(matches!(result, Err(OracleError::MissingCredential(_))));
    }

    #[test]
    fn request_defaults() {
        let request = CompletionRequest::new(vec![ChatMessage::system("s"), ChatMessage::user("u")]);
        assert_eq!(request.temperature, 0.2);
        assert_eq!(request.max_tokens, 1024);
        assert_eq!(request.top_p, 1.0);
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages[1].role, "user");
    }
}
