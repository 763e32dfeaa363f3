//! Object names and qualification rules
//!
//! Warehouse objects are addressed as `database.schema.object`. Names coming
//! back from the oracle are frequently partial, so everything here is about
//! turning one-, two- and three-part names into fully qualified identifiers
//! given whatever context is known.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies an object (table or view) in a warehouse
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentifier {
    /// Database name
    pub database: String,

    /// Schema name
    pub schema: String,

    /// Table or view name
    pub object: String,
}

impl ObjectIdentifier {
    /// Create a new object identifier
    pub fn new(database: impl Into<String>, schema: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            schema: schema.into(),
            object: object.into(),
        }
    }

    /// Get fully qualified name
    pub fn fqn(&self) -> String {
        format!("{}.{}.{}", self.database, self.schema, self.object)
    }

    /// Qualification context for names found inside this object's DDL
    pub fn context(&self) -> QualificationContext {
        QualificationContext::new(self.database.clone(), self.schema.clone())
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fqn())
    }
}

impl From<ObjectIdentifier> for QualifiedName {
    fn from(id: ObjectIdentifier) -> Self {
        QualifiedName {
            database: Some(id.database),
            schema: Some(id.schema),
            object: id.object,
        }
    }
}

/// A possibly partial object name: `object`, `schema.object` or
/// `database.schema.object`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub database: Option<String>,
    pub schema: Option<String>,
    pub object: String,
}

impl QualifiedName {
    /// Parse a dotted name into one to three trimmed, non-empty parts.
    ///
    /// Returns `None` when nothing usable remains or when there are more than
    /// three parts.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts = split_parts(raw);
        match parts.as_slice() {
            [object] => Some(Self {
                database: None,
                schema: None,
                object: object.to_string(),
            }),
            [schema, object] => Some(Self {
                database: None,
                schema: Some(schema.to_string()),
                object: object.to_string(),
            }),
            [database, schema, object] => Some(Self {
                database: Some(database.to_string()),
                schema: Some(schema.to_string()),
                object: object.to_string(),
            }),
            _ => None,
        }
    }

    /// Number of parts present (1 to 3)
    pub fn depth(&self) -> usize {
        match (&self.database, &self.schema) {
            (Some(_), Some(_)) => 3,
            (None, Some(_)) => 2,
            _ => 1,
        }
    }

    pub fn is_fully_qualified(&self) -> bool {
        self.depth() == 3
    }

    /// Fill in missing parts from the object whose DDL mentioned this name.
    ///
    /// A two-part name only borrows the database; a one-part name borrows both.
    pub fn resolve(&self, database: &str, schema: &str) -> ObjectIdentifier {
        ObjectIdentifier::new(
            self.database.as_deref().unwrap_or(database),
            self.schema.as_deref().unwrap_or(schema),
            self.object.as_str(),
        )
    }

    /// Convert to an identifier if all three parts are present
    pub fn to_identifier(&self) -> Option<ObjectIdentifier> {
        match (&self.database, &self.schema) {
            (Some(database), Some(schema)) => {
                Some(ObjectIdentifier::new(database.as_str(), schema.as_str(), self.object.as_str()))
            }
            _ => None,
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(database) = &self.database {
            write!(f, "{}.", database)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.object)
    }
}

/// Default database and schema used to qualify partial names
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QualificationContext {
    pub database: Option<String>,
    pub schema: Option<String>,
}

impl QualificationContext {
    pub fn new(database: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            database: non_blank(database.into()),
            schema: non_blank(schema.into()),
        }
    }

    /// Qualify `name` against this context. See [`qualify`].
    pub fn qualify(&self, name: &str) -> String {
        qualify(name, self.database.as_deref(), self.schema.as_deref())
    }
}

/// Normalize a partial object name using the given defaults.
///
/// - three parts are joined unchanged
/// - two parts get the default database prepended when one is known
/// - one part gets `database.schema.` when both are known, `schema.` when
///   only the schema is known, and is returned bare otherwise
/// - anything else (no parts, more than three) is returned as given
///
/// Blank defaults are treated as missing.
pub fn qualify(name: &str, default_database: Option<&str>, default_schema: Option<&str>) -> String {
    let default_database = default_database.map(str::trim).filter(|s| !s.is_empty());
    let default_schema = default_schema.map(str::trim).filter(|s| !s.is_empty());

    let parts = split_parts(name);
    match parts.as_slice() {
        [database, schema, object] => format!("{}.{}.{}", database, schema, object),
        [schema, object] => match default_database {
            Some(database) => format!("{}.{}.{}", database, schema, object),
            None => format!("{}.{}", schema, object),
        },
        [object] => match (default_database, default_schema) {
            (Some(database), Some(schema)) => format!("{}.{}.{}", database, schema, object),
            (_, Some(schema)) => format!("{}.{}", schema, object),
            _ => object.to_string(),
        },
        _ => name.to_string(),
    }
}

fn split_parts(raw: &str) -> Vec<&str> {
    raw.split('.')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

fn non_blank(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
