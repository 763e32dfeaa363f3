//! Warehouse driver trait used by the lineage resolver

use serde::{Deserialize, Serialize};
use std::fmt;
use viewlineage_core::{ObjectIdentifier, QualifiedName};

/// Kind of a warehouse relation as far as lineage is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ObjectKind {
    Table,
    View,
}

impl ObjectKind {
    /// Map an INFORMATION_SCHEMA `TABLE_TYPE` value.
    ///
    /// Anything mentioning VIEW (`VIEW`, `MATERIALIZED VIEW`, `SECURE VIEW`)
    /// is a view; `BASE TABLE`, `EXTERNAL TABLE` and the rest are tables.
    pub fn from_table_type(table_type: &str) -> Self {
        if table_type.to_uppercase().contains("VIEW") {
            Self::View
        } else {
            Self::Table
        }
    }

    /// Object type keyword understood by `GET_DDL`
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::View => "VIEW",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An object listed in a schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: ObjectKind,
}

impl CatalogObject {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Errors that can occur when talking to a warehouse
#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Query failed: {0}")]
    QueryError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CatalogError {
    /// Classify a raw driver error message for `target`
    pub fn from_message(message: impl Into<String>, target: &str) -> Self {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("does not exist") || lowered.contains("not found") {
            Self::ObjectNotFound(format!("{}: {}", target, message))
        } else if lowered.contains("insufficient privileges") || lowered.contains("permission") {
            Self::PermissionDenied(format!("Cannot access {}: {}", target, message))
        } else {
            Self::QueryError(message)
        }
    }
}

/// Trait for warehouse drivers consumed by the lineage resolver
#[async_trait::async_trait]
pub trait WarehouseDriver: Send + Sync {
    /// Get the driver name (e.g., "Snowflake")
    fn name(&self) -> &'static str;

    /// Test the connection to the warehouse
    async fn test_connection(&self) -> Result<(), CatalogError>;

    /// Decide whether `name` is a view or a table.
    ///
    /// Three-part names are looked up in their own database and schema,
    /// two-part names in the session's current database, one-part names
    /// without any scope. `Ok(None)` means the object was not found.
    async fn classify_object(&self, name: &QualifiedName) -> Result<Option<ObjectKind>, CatalogError>;

    /// Fetch the DDL of an object.
    ///
    /// `Ok(None)` means the warehouse returned nothing, which usually means
    /// missing privileges or an object that was dropped in the meantime.
    async fn fetch_ddl(&self, object: &ObjectIdentifier, kind: ObjectKind) -> Result<Option<String>, CatalogError>;

    /// List databases visible to the session
    async fn list_databases(&self) -> Result<Vec<String>, CatalogError>;

    /// List schemas in a database
    async fn list_schemas(&self, database: &str) -> Result<Vec<String>, CatalogError>;

    /// List tables and views in a schema, ordered by name
    async fn list_objects(&self, database: &str, schema: &str) -> Result<Vec<CatalogObject>, CatalogError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_type_mapping() {
        assert_eq!(ObjectKind::from_table_type("VIEW"), ObjectKind::View);
        assert_eq!(ObjectKind::from_table_type("MATERIALIZED VIEW"), ObjectKind::View);
        assert_eq!(ObjectKind::from_table_type("secure view"), ObjectKind::View);
        assert_eq!(ObjectKind::from_table_type("BASE TABLE"), ObjectKind::Table);
        assert_eq!(ObjectKind::from_table_type("EXTERNAL TABLE"), ObjectKind::Table);
    }

    #[test]
    fn error_message_classification() {
        let err = CatalogError::from_message("Object 'X' does not exist or not authorized.", "D.S.X");
        assert!(matches!(err, CatalogError::ObjectNotFound(_)));

        let err = CatalogError::from_message("Insufficient privileges to operate on view", "D.S.V");
        assert!(matches!(err, CatalogError::PermissionDenied(_)));

        let err = CatalogError::from_message("SQL compilation error", "D.S.V");
        assert!(matches!(err, CatalogError::QueryError(_)));
    }

    #[test]
    fn catalog_object_serializes_like_listing_api() {
        let obj = CatalogObject::new("ORDERS_V", ObjectKind::View);
        let json = serde_json::to_value(&obj).unwrap();
        assert_eq!(json, serde_json::json!({"name": "ORDERS_V", "type": "VIEW"}));
    }
}
