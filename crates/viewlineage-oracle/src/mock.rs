//! Scripted oracle for tests and demos
//!
//! Replies are chosen by substring match against the user prompt, so a test
//! can key each answer on something unique in the DDL it belongs to.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::transport::{Completion, CompletionRequest, OracleCredential, OracleError, TextOracle};

#[derive(Debug, Clone)]
enum MockReply {
    Text(String),
    Fail(OracleError),
}

/// Scripted oracle
#[derive(Clone)]
pub struct MockOracle {
    rules: Vec<(String, MockReply)>,
    default_reply: MockReply,
    tokens_per_call: u64,
    calls: Arc<AtomicUsize>,
    prompts: Arc<RwLock<Vec<String>>>,
}

impl MockOracle {
    /// An oracle that answers every prompt with an empty list
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_reply: MockReply::Text(String::new()),
            tokens_per_call: 0,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Answer `reply` when the prompt contains `needle`. Earlier rules win.
    pub fn with_reply(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
        self.rules.push((needle.into(), MockReply::Text(reply.into())));
        self
    }

    /// Fail with `error` when the prompt contains `needle`
    pub fn with_failure(mut self, needle: impl Into<String>, error: OracleError) -> Self {
        self.rules.push((needle.into(), MockReply::Fail(error)));
        self
    }

    /// Reply used when no rule matches
    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = MockReply::Text(reply.into());
        self
    }

    /// Fail every call that no rule matches
    pub fn failing(mut self, error: OracleError) -> Self {
        self.default_reply = MockReply::Fail(error);
        self
    }

    /// Token usage reported for each successful call
    pub fn with_tokens_per_call(mut self, tokens: u64) -> Self {
        self.tokens_per_call = tokens;
        self
    }

    /// Number of completions requested so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received, in call order
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.read().await.clone()
    }
}

impl Default for MockOracle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextOracle for MockOracle {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, credential: &OracleCredential, request: &CompletionRequest) -> Result<Completion, OracleError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if credential.is_empty() {
            return Err(OracleError::MissingCredential("empty API key".to_string()));
        }

        let prompt = request
            .messages
            .iter()
            .rev()
            .find(|m| m.role == "user")
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.write().await.push(prompt.clone());

        let reply = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, reply)| reply)
            .unwrap_or(&self.default_reply);

        match reply {
            MockReply::Text(text) => Ok(Completion {
                text: text.trim().to_string(),
                tokens_used: self.tokens_per_call,
            }),
            MockReply::Fail(error) => Err(error.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ChatMessage;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest::new(vec![ChatMessage::system("sys"), ChatMessage::user(prompt)])
    }

    #[tokio::test]
    async fn replies_by_substring() {
        let oracle = MockOracle::new()
            .with_reply("FROM orders", "1. D.S.ORDERS")
            .with_reply("FROM", "1. D.S.OTHER")
            .with_tokens_per_call(42);
        let key = OracleCredential::new("k");

        let answer = oracle.complete(&key, &request("SELECT * FROM orders")).await.unwrap();
        assert_eq!(answer.text, "1. D.S.ORDERS");
        assert_eq!(answer.tokens_used, 42);

        let answer = oracle.complete(&key, &request("SELECT * FROM x")).await.unwrap();
        assert_eq!(answer.text, "1. D.S.OTHER");

        let answer = oracle.complete(&key, &request("nothing")).await.unwrap();
        assert_eq!(answer.text, "");

        assert_eq!(oracle.call_count(), 3);
        assert_eq!(oracle.prompts().await.len(), 3);
    }

    #[tokio::test]
    async fn scripted_failures() {
        let oracle = MockOracle::new()
            .with_failure("rate", OracleError::Api { status: 429, body: "slow down".to_string() })
            .failing(OracleError::Timeout(60));
        let key = OracleCredential::new("k");

        let result = oracle.complete(&key, &request("rate limited")).await;
        assert!(matches!(result, Err(OracleError::Api { status: 429, .. })));

        let result = oracle.complete(&key, &request("anything")).await;
        assert!(matches!(result, Err(OracleError::Timeout(60))));
    }

    #[tokio::test]
    async fn validate_uses_complete() {
        let oracle = MockOracle::new().with_default_reply("Hi!");
        assert!(oracle.validate(&OracleCredential::new("k")).await.is_ok());
        assert!(oracle.validate(&OracleCredential::new("")).await.is_err());
    }

    #[tokio::test]
    async fn validate_rejects_in_band_failure() {
        let oracle = MockOracle::new().with_default_reply("Error: Invalid API Key");
        let result = oracle.validate(&OracleCredential::new("gsk_revoked")).await;
        assert!(matches!(result, Err(OracleError::Reported(text)) if text == "Error: Invalid API Key"));
    }
}
