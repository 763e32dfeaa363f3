//! Metadata SQL issued by warehouse drivers
//!
//! Kept separate from the drivers so the statements can be checked without a
//! live connection. Names are embedded as quoted identifiers or string
//! literals with the quote character doubled.

use viewlineage_core::{ObjectIdentifier, QualifiedName};
use crate::adapter::ObjectKind;

/// Quote an identifier: `my"db` becomes `"my""db"`
pub fn quote_identifier(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Quote a string literal: `o'brien` becomes `'o''brien'`
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Query returning the `TABLE_TYPE` of `name`, scoped by however much of the
/// name is known
pub fn classification_query(name: &QualifiedName) -> String {
    match (&name.database, &name.schema) {
        (Some(database), Some(schema)) => format!(
            "SELECT TABLE_TYPE FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} LIMIT 1",
            quote_identifier(database),
            quote_literal(schema),
            quote_literal(&name.object)
        ),
        (_, Some(schema)) => format!(
            "SELECT TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} AND TABLE_NAME = {} LIMIT 1",
            quote_literal(schema),
            quote_literal(&name.object)
        ),
        _ => format!(
            "SELECT TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = {} LIMIT 1",
            quote_literal(&name.object)
        ),
    }
}

/// `GET_DDL` call for one object
pub fn ddl_query(object: &ObjectIdentifier, kind: ObjectKind) -> String {
    format!(
        "SELECT GET_DDL({}, {}) AS DDL",
        quote_literal(kind.as_str()),
        quote_literal(&object.fqn())
    )
}

pub fn show_databases_query() -> &'static str {
    "SHOW DATABASES"
}

pub fn show_schemas_query(database: &str) -> String {
    format!("SHOW SCHEMAS IN DATABASE {}", quote_identifier(database))
}

/// Tables and views of a schema, ordered by name
pub fn list_objects_query(database: &str, schema: &str) -> String {
    format!(
        "SELECT TABLE_NAME, TABLE_TYPE FROM {}.INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = {} ORDER BY TABLE_NAME",
        quote_identifier(database),
        quote_literal(schema)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_scoped_by_parts() {
        let q = classification_query(&QualifiedName::parse("DB.S.V").unwrap());
        assert_eq!(
            q,
            "SELECT TABLE_TYPE FROM \"DB\".INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'S' AND TABLE_NAME = 'V' LIMIT 1"
        );

        let q = classification_query(&QualifiedName::parse("S.V").unwrap());
        assert_eq!(
            q,
            "SELECT TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'S' AND TABLE_NAME = 'V' LIMIT 1"
        );

        let q = classification_query(&QualifiedName::parse("V").unwrap());
        assert_eq!(
            q,
            "SELECT TABLE_TYPE FROM INFORMATION_SCHEMA.TABLES WHERE TABLE_NAME = 'V' LIMIT 1"
        );
    }

    #[test]
    fn quoting_escapes_embedded_quotes() {
        assert_eq!(quote_identifier("my\"db"), "\"my\"\"db\"");
        assert_eq!(quote_literal("o'brien"), "'o''brien'");

        let q = classification_query(&QualifiedName::parse("x' OR '1'='1").unwrap());
        assert!(q.ends_with("TABLE_NAME = 'x'' OR ''1''=''1' LIMIT 1"));
    }

    #[test]
    fn ddl_and_listing_queries() {
        let id = ObjectIdentifier::new("SALES", "PUBLIC", "ORDERS_V");
        assert_eq!(
            ddl_query(&id, ObjectKind::View),
            "SELECT GET_DDL('VIEW', 'SALES.PUBLIC.ORDERS_V') AS DDL"
        );
        assert_eq!(show_schemas_query("SALES"), "SHOW SCHEMAS IN DATABASE \"SALES\"");
        assert_eq!(
            list_objects_query("SALES", "PUBLIC"),
            "SELECT TABLE_NAME, TABLE_TYPE FROM \"SALES\".INFORMATION_SCHEMA.TABLES WHERE TABLE_SCHEMA = 'PUBLIC' ORDER BY TABLE_NAME"
        );
    }
}
