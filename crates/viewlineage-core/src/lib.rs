//! viewlineage core
//!
//! Domain model shared by every other crate: object names and their
//! qualification rules, SQL text cleanup, oracle list parsing, the lineage
//! tree and the configuration file.
//! The JSON shape of the lineage tree is part of the public output - keep
//! `NodeType` spellings stable.

pub mod names;
pub mod sql;
pub mod list;
pub mod lineage;
pub mod config;

pub use names::{qualify, QualifiedName, ObjectIdentifier, QualificationContext};
pub use sql::strip_comments;
pub use list::parse_list_response;
pub use lineage::{LineageNode, NodeType, LineageGraph, LineageReport, LineageFailure, TraversalStats};
pub use config::{Config, ConfigError, LineageSettings, OracleSettings, WarehouseConfig, DEFAULT_REQUEST_MAX_DEPTH};
