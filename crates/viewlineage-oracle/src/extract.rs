//! Source extraction: DDL text in, qualified source names out

use async_trait::async_trait;
use viewlineage_core::{parse_list_response, strip_comments, OracleSettings, QualificationContext};

use crate::transport::{
    ChatMessage, CompletionRequest, OracleCredential, OracleError, TextOracle, FAILURE_MARKER,
};

const SYSTEM_PROMPT: &str = "You are a SQL lineage extraction assistant.";

/// Candidate sources of one view
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Qualified names in the order the extractor listed them
    pub sources: Vec<String>,

    /// Tokens spent producing the answer
    pub tokens_used: u64,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ExtractionError {
    #[error("{0}")]
    Oracle(#[from] OracleError),
}

/// Finds the objects a view's DDL reads from.
///
/// The resolver only depends on this trait, so the oracle-backed
/// implementation can be swapped for another one without touching the
/// traversal.
#[async_trait]
pub trait SourceExtractor: Send + Sync {
    fn name(&self) -> &str;

    /// List the sources referenced by `ddl`, qualified against `context`.
    ///
    /// An empty `Ok` means the extractor found nothing; an `Err` means it
    /// could not answer.
    async fn extract(
        &self,
        credential: &OracleCredential,
        ddl: &str,
        context: &QualificationContext,
    ) -> Result<Extraction, ExtractionError>;

    /// Check that `credential` is usable
    async fn validate(&self, _credential: &OracleCredential) -> Result<(), ExtractionError> {
        Ok(())
    }
}

/// Extractor that asks a text oracle for the sources
pub struct OracleSourceExtractor<O> {
    oracle: O,
    temperature: f32,
    max_tokens: u32,
}

impl<O: TextOracle> OracleSourceExtractor<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            temperature: 0.2,
            max_tokens: 1024,
        }
    }

    /// Sampling parameters from the `[oracle]` configuration section
    pub fn with_settings(oracle: O, settings: &OracleSettings) -> Self {
        Self {
            oracle,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    fn request_for(&self, ddl: &str) -> CompletionRequest {
        let cleaned = strip_comments(ddl);
        CompletionRequest::new(vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(build_prompt(&cleaned)),
        ])
        .with_temperature(self.temperature)
        .with_max_tokens(self.max_tokens)
    }
}

/// Instruction prompt wrapped around comment-free DDL
pub fn build_prompt(cleaned_ddl: &str) -> String {
    format!(
        "You are an expert in Snowflake SQL. I will give you a CREATE OR REPLACE VIEW or DDL statement.\n\
         Task:\n \
         - Extract the source tables/views that appear in FROM and JOIN clauses.\n \
         - Ignore any commented-out lines.\n \
         - Return fully qualified names if present (DATABASE.SCHEMA.OBJECT).\n \
         - If a source is not fully qualified, try to infer schema/database from context; otherwise return the name as-is.\n \
         - Output a strict numbered list, one entry per line. No extra explanation.\n\
         \n\
         DDL:\n\
         {}\n",
        cleaned_ddl
    )
}

#[async_trait]
impl<O: TextOracle> SourceExtractor for OracleSourceExtractor<O> {
    fn name(&self) -> &str {
        self.oracle.name()
    }

    async fn extract(
        &self,
        credential: &OracleCredential,
        ddl: &str,
        context: &QualificationContext,
    ) -> Result<Extraction, ExtractionError> {
        let request = self.request_for(ddl);

        let completion = self.oracle.complete(credential, &request).await.map_err(|e| {
            tracing::warn!(oracle = self.oracle.name(), error = %e, "source extraction failed");
            ExtractionError::Oracle(e)
        })?;

        if completion.text.starts_with(FAILURE_MARKER) {
            tracing::warn!(oracle = self.oracle.name(), "oracle reported failure in response text");
            return Err(ExtractionError::Oracle(OracleError::Reported(completion.text)));
        }

        let sources: Vec<String> = parse_list_response(&completion.text)
            .iter()
            .map(|candidate| context.qualify(candidate))
            .collect();

        tracing::debug!(count = sources.len(), tokens = completion.tokens_used, "sources extracted");

        Ok(Extraction {
            sources,
            tokens_used: completion.tokens_used,
        })
    }

    async fn validate(&self, credential: &OracleCredential) -> Result<(), ExtractionError> {
        self.oracle.validate(credential).await.map_err(ExtractionError::from)
    }
}
