//! Lineage resolution engine
//!
//! Walks view dependencies through a warehouse driver and a source
//! extractor, producing a finite lineage tree for one root object.

pub mod budget;
pub mod resolver;
pub mod session;

pub use budget::TraversalBudget;
pub use resolver::{LineageResolver, DEFAULT_MAX_DEPTH};
pub use session::{Session, SessionError, SessionId, SessionManager};
