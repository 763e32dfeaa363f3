//! Text oracle access and source extraction
//!
//! The oracle is a chat-completion model asked to list the tables and views a
//! piece of DDL reads from. This crate holds:
//! - the transport trait ([`TextOracle`]) with an OpenAI-compatible HTTP
//!   client and an in-memory mock
//! - the pluggable [`SourceExtractor`] capability and its oracle-backed
//!   implementation, which cleans the DDL, prompts the oracle and turns the
//!   answer into qualified names

pub mod transport;
pub mod client;
pub mod mock;
pub mod extract;

pub use transport::{TextOracle, OracleCredential, ChatMessage, CompletionRequest, Completion, OracleError, FAILURE_MARKER};
pub use client::ChatCompletionsClient;
pub use mock::MockOracle;
pub use extract::{SourceExtractor, OracleSourceExtractor, Extraction, ExtractionError};
