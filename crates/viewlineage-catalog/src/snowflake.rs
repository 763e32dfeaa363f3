//! Snowflake warehouse driver using INFORMATION_SCHEMA and GET_DDL
//!
//! Classification reads `INFORMATION_SCHEMA.TABLES.TABLE_TYPE`; view text
//! comes from `GET_DDL('VIEW', ...)`. The session needs:
//! - USAGE on the databases and schemas being traversed
//! - SELECT on INFORMATION_SCHEMA views
//! - ownership or REFERENCES on views whose DDL should be visible
//!
//! ## Authentication Methods
//!
//! 1. Password authentication (username/password)
//! 2. Key-pair authentication (private key PEM)
//!
//! ## Usage
//!
//! ```rust,ignore
//! let driver = SnowflakeDriver::new(
//!     "xy12345.us-east-1",
//!     "username",
//!     "password"
//! )
//! .with_warehouse("COMPUTE_WH")
//! .with_role("ANALYST")
//! .build()?;
//! ```

use crate::adapter::{CatalogError, CatalogObject, ObjectKind, WarehouseDriver};
use crate::query;
use viewlineage_core::{ObjectIdentifier, QualifiedName};

#[cfg(feature = "snowflake")]
use snowflake_api::SnowflakeApi;

/// Snowflake authentication credentials
#[derive(Clone)]
pub enum SnowflakeCredentials {
    /// Password-based authentication
    Password(String),
    /// Key-pair authentication (PEM format private key)
    PrivateKey(String),
}

impl std::fmt::Debug for SnowflakeCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Password(_) => write!(f, "Password(***)"),
            Self::PrivateKey(_) => write!(f, "PrivateKey(***)"),
        }
    }
}

/// Builder for SnowflakeDriver
#[derive(Debug)]
pub struct SnowflakeDriverBuilder {
    account: String,
    username: String,
    credentials: SnowflakeCredentials,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
    schema: Option<String>,
}

impl SnowflakeDriverBuilder {
    /// Create new builder with password authentication
    pub fn with_password(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            credentials: SnowflakeCredentials::Password(password.into()),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
        }
    }

    /// Create new builder with key-pair authentication
    pub fn with_key_pair(
        account: impl Into<String>,
        username: impl Into<String>,
        private_key_pem: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            username: username.into(),
            credentials: SnowflakeCredentials::PrivateKey(private_key_pem.into()),
            warehouse: None,
            role: None,
            database: None,
            schema: None,
        }
    }

    /// Set the warehouse to use
    pub fn with_warehouse(mut self, warehouse: impl Into<String>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    /// Set the role to use
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the session database; two-part names are classified against it
    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the session schema
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Build the driver
    #[cfg(feature = "snowflake")]
    pub fn build(self) -> Result<SnowflakeDriver, CatalogError> {
        let api = match &self.credentials {
            SnowflakeCredentials::Password(password) => {
                SnowflakeApi::with_password_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    self.database.as_deref(),
                    self.schema.as_deref(),
                    &self.username,
                    self.role.as_deref(),
                    password,
                )
                .map_err(|e| CatalogError::AuthenticationError(format!(
                    "Failed to authenticate with Snowflake: {}",
                    e
                )))?
            }
            SnowflakeCredentials::PrivateKey(private_key_pem) => {
                SnowflakeApi::with_certificate_auth(
                    &self.account,
                    self.warehouse.as_deref(),
                    self.database.as_deref(),
                    self.schema.as_deref(),
                    &self.username,
                    self.role.as_deref(),
                    private_key_pem,
                )
                .map_err(|e| CatalogError::AuthenticationError(format!(
                    "Failed to authenticate with key-pair: {}",
                    e
                )))?
            }
        };

        Ok(SnowflakeDriver {
            api,
            account: self.account,
            warehouse: self.warehouse,
            role: self.role,
            database: self.database,
        })
    }

    /// Build without snowflake feature
    #[cfg(not(feature = "snowflake"))]
    pub fn build(self) -> Result<SnowflakeDriver, CatalogError> {
        Err(not_compiled())
    }
}

/// Snowflake warehouse driver
pub struct SnowflakeDriver {
    #[cfg(feature = "snowflake")]
    api: SnowflakeApi,

    account: String,
    warehouse: Option<String>,
    role: Option<String>,
    database: Option<String>,
}

/// Rows of string cells, in the column order requested
type Rows = Vec<Vec<Option<String>>>;

impl SnowflakeDriver {
    /// Create a new Snowflake driver with password authentication (returns builder)
    pub fn new(
        account: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> SnowflakeDriverBuilder {
        SnowflakeDriverBuilder::with_password(account, username, password)
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    /// Short description for logs: account, warehouse, role, database
    pub fn describe(&self) -> String {
        format!(
            "{} (warehouse: {}, role: {}, database: {})",
            self.account,
            self.warehouse.as_deref().unwrap_or("-"),
            self.role.as_deref().unwrap_or("-"),
            self.database.as_deref().unwrap_or("-"),
        )
    }

    /// Run `sql` and return the requested columns as strings
    #[cfg(feature = "snowflake")]
    async fn query_rows(&self, sql: &str, columns: &[&str], target: &str) -> Result<Rows, CatalogError> {
        tracing::debug!(account = %self.account, %sql, "executing metadata query");

        let result = self
            .api
            .exec(sql)
            .await
            .map_err(|e| CatalogError::from_message(e.to_string(), target))?;

        rows_from_result(result, columns)
    }

    #[cfg(not(feature = "snowflake"))]
    async fn query_rows(&self, _sql: &str, _columns: &[&str], _target: &str) -> Result<Rows, CatalogError> {
        Err(not_compiled())
    }
}

#[cfg(feature = "snowflake")]
fn rows_from_result(result: snowflake_api::QueryResult, columns: &[&str]) -> Result<Rows, CatalogError> {
    use arrow_array::cast::AsArray;
    use arrow_array::Array;
    use snowflake_api::QueryResult;

    let mut rows = Vec::new();

    match result {
        QueryResult::Arrow(batches) => {
            for batch in batches {
                let schema = batch.schema();
                let mut arrays = Vec::with_capacity(columns.len());
                for column in columns {
                    let idx = schema
                        .fields()
                        .iter()
                        .position(|f| f.name().eq_ignore_ascii_case(column))
                        .ok_or_else(|| CatalogError::InvalidResponse(format!("Missing {} column", column)))?;
                    let array = batch
                        .column(idx)
                        .as_string_opt::<i32>()
                        .ok_or_else(|| CatalogError::InvalidResponse(format!("Column {} is not a string", column)))?;
                    arrays.push(array);
                }

                for row_idx in 0..batch.num_rows() {
                    rows.push(
                        arrays
                            .iter()
                            .map(|array| {
                                if array.is_null(row_idx) {
                                    None
                                } else {
                                    Some(array.value(row_idx).to_string())
                                }
                            })
                            .collect(),
                    );
                }
            }
        }
        QueryResult::Json(json) => {
            let indices = columns
                .iter()
                .map(|column| {
                    json.schema
                        .iter()
                        .position(|field| field.name.eq_ignore_ascii_case(column))
                        .ok_or_else(|| CatalogError::InvalidResponse(format!("Missing {} column", column)))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let values = json
                .value
                .as_array()
                .ok_or_else(|| CatalogError::InvalidResponse("Expected an array of rows".to_string()))?;

            for value in values {
                let cells = value.as_array().map(Vec::as_slice).unwrap_or(&[]);
                rows.push(
                    indices
                        .iter()
                        .map(|&idx| cells.get(idx).and_then(|cell| cell.as_str()).map(str::to_string))
                        .collect(),
                );
            }
        }
        QueryResult::Empty => {}
    }

    Ok(rows)
}

#[cfg(not(feature = "snowflake"))]
fn not_compiled() -> CatalogError {
    CatalogError::ConfigError(
        "Snowflake support not compiled. Rebuild with: cargo build --features snowflake".to_string()
    )
}

/// First cell of the first row, if any
fn first_cell(rows: Rows) -> Option<String> {
    rows.into_iter().next().and_then(|row| row.into_iter().next().flatten())
}

/// Distinct non-empty values of the first column, in result order
fn distinct_names(rows: Rows) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for name in rows.into_iter().filter_map(|row| row.into_iter().next().flatten()) {
        if !name.is_empty() && !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

#[async_trait::async_trait]
impl WarehouseDriver for SnowflakeDriver {
    fn name(&self) -> &'static str {
        "Snowflake"
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.query_rows("SELECT 1 AS ONE", &[], "connection test")
            .await
            .map_err(|e| CatalogError::QueryError(format!("Connection test failed: {}", e)))?;
        Ok(())
    }

    async fn classify_object(&self, name: &QualifiedName) -> Result<Option<ObjectKind>, CatalogError> {
        let sql = query::classification_query(name);
        let rows = self.query_rows(&sql, &["TABLE_TYPE"], &name.to_string()).await?;
        Ok(first_cell(rows).map(|table_type| ObjectKind::from_table_type(&table_type)))
    }

    async fn fetch_ddl(&self, object: &ObjectIdentifier, kind: ObjectKind) -> Result<Option<String>, CatalogError> {
        let sql = query::ddl_query(object, kind);
        let rows = self.query_rows(&sql, &["DDL"], &object.fqn()).await?;
        Ok(first_cell(rows).filter(|ddl| !ddl.trim().is_empty()))
    }

    async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        let rows = self.query_rows(query::show_databases_query(), &["name"], "databases").await?;
        Ok(distinct_names(rows))
    }

    async fn list_schemas(&self, database: &str) -> Result<Vec<String>, CatalogError> {
        let sql = query::show_schemas_query(database);
        let rows = self.query_rows(&sql, &["name"], database).await?;
        Ok(distinct_names(rows))
    }

    async fn list_objects(&self, database: &str, schema: &str) -> Result<Vec<CatalogObject>, CatalogError> {
        let sql = query::list_objects_query(database, schema);
        let target = format!("{}.{}", database, schema);
        let rows = self.query_rows(&sql, &["TABLE_NAME", "TABLE_TYPE"], &target).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter();
                let name = cells.next().flatten()?;
                let table_type = cells.next().flatten().unwrap_or_default();
                Some(CatalogObject::new(name, ObjectKind::from_table_type(&table_type)))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(values: &[&[Option<&str>]]) -> Rows {
        values
            .iter()
            .map(|row| row.iter().map(|cell| cell.map(str::to_string)).collect())
            .collect()
    }

    #[test]
    fn first_cell_handles_empty_and_null() {
        assert_eq!(first_cell(Vec::new()), None);
        assert_eq!(first_cell(rows(&[&[None]])), None);
        assert_eq!(first_cell(rows(&[&[Some("VIEW")], &[Some("BASE TABLE")]])), Some("VIEW".to_string()));
    }

    #[test]
    fn distinct_names_skips_duplicates_and_blanks() {
        let listed = distinct_names(rows(&[
            &[Some("SALES")],
            &[Some("")],
            &[None],
            &[Some("SALES")],
            &[Some("SNOWFLAKE")],
        ]));
        assert_eq!(listed, vec!["SALES", "SNOWFLAKE"]);
    }

    #[test]
    fn credentials_are_redacted() {
        let builder = SnowflakeDriver::new("account", "user", "hunter2").with_role("ANALYST");
        let debug = format!("{:?}", builder);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("ANALYST"));
    }

    #[cfg(not(feature = "snowflake"))]
    #[test]
    fn build_without_feature_is_config_error() {
        let result = SnowflakeDriver::new("account", "user", "pass").build();
        assert!(matches!(result, Err(CatalogError::ConfigError(_))));
    }
}
