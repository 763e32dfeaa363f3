//! Mock warehouse driver for testing
//!
//! Holds an in-memory catalog of tables and views (with their DDL) and
//! answers driver calls from it without connecting to any warehouse.
//! It's useful for:
//! - Unit testing the lineage resolver
//! - Integration testing CI/CD pipelines
//! - Demos without real credentials
//! - Simulating permission errors, missing DDL and flaky metadata queries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use viewlineage_catalog::{MockWarehouseBuilder, WarehouseDriver};
//!
//! let warehouse = MockWarehouseBuilder::new()
//!     .with_table("SALES", "PUBLIC", "ORDERS")
//!     .with_view("SALES", "PUBLIC", "ORDERS_V", "CREATE VIEW ORDERS_V AS SELECT * FROM ORDERS")
//!     .build();
//! ```

use crate::adapter::{CatalogError, CatalogObject, ObjectKind, WarehouseDriver};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use viewlineage_core::{ObjectIdentifier, QualifiedName};

/// One object in the mock catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockObject {
    pub kind: ObjectKind,

    /// DDL returned by `fetch_ddl`; `None` simulates an object whose DDL is
    /// not visible to the session
    pub ddl: Option<String>,
}

#[derive(Debug, Default)]
struct CallCounters {
    classify: AtomicUsize,
    ddl: AtomicUsize,
}

/// Mock warehouse driver for testing
///
/// Objects are keyed by fully qualified name. Clones share state, so a test
/// can keep a handle for inspecting call counts after handing the driver to
/// a resolver.
pub struct MockWarehouse {
    objects: Arc<RwLock<BTreeMap<String, MockObject>>>,

    /// Errors returned by `classify_object`, keyed by the name as given
    classify_errors: Arc<RwLock<BTreeMap<String, CatalogError>>>,

    /// Errors returned by `fetch_ddl`, keyed by fully qualified name
    ddl_errors: Arc<RwLock<BTreeMap<String, CatalogError>>>,

    /// Session database used for two-part names
    current_database: Option<String>,

    fail_connection: bool,

    /// Simulate query latency (milliseconds)
    latency_ms: u64,

    counters: Arc<CallCounters>,
}

impl MockWarehouse {
    /// Create a new mock warehouse with an empty catalog
    pub fn new() -> Self {
        MockWarehouseBuilder::new().build()
    }

    /// Add a table
    pub async fn add_table(&self, object: ObjectIdentifier) {
        self.objects.write().await.insert(
            object.fqn(),
            MockObject {
                kind: ObjectKind::Table,
                ddl: None,
            },
        );
    }

    /// Add a view with its DDL
    pub async fn add_view(&self, object: ObjectIdentifier, ddl: impl Into<String>) {
        self.objects.write().await.insert(
            object.fqn(),
            MockObject {
                kind: ObjectKind::View,
                ddl: Some(ddl.into()),
            },
        );
    }

    /// Remove an object, simulating a drop between calls
    pub async fn remove(&self, object: &ObjectIdentifier) -> Option<MockObject> {
        self.objects.write().await.remove(&object.fqn())
    }

    /// Configure an error for `classify_object` on `name`
    pub async fn add_classify_error(&self, name: &str, error: CatalogError) {
        self.classify_errors.write().await.insert(name.to_string(), error);
    }

    /// Configure an error for `fetch_ddl` on `object`
    pub async fn add_ddl_error(&self, object: &ObjectIdentifier, error: CatalogError) {
        self.ddl_errors.write().await.insert(object.fqn(), error);
    }

    /// Get the number of objects in the catalog
    pub async fn object_count(&self) -> usize {
        self.objects.read().await.len()
    }

    /// Number of `classify_object` calls served so far
    pub fn classify_calls(&self) -> usize {
        self.counters.classify.load(Ordering::SeqCst)
    }

    /// Number of `fetch_ddl` calls served so far
    pub fn ddl_calls(&self) -> usize {
        self.counters.ddl.load(Ordering::SeqCst)
    }

    /// Simulate latency if configured
    async fn simulate_latency(&self) {
        if self.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.latency_ms)).await;
        }
    }

    /// Find the catalog entry a possibly partial name refers to
    fn lookup<'a>(
        &self,
        objects: &'a BTreeMap<String, MockObject>,
        name: &QualifiedName,
    ) -> Option<&'a MockObject> {
        match (&name.database, &name.schema) {
            (Some(database), Some(schema)) => {
                objects.get(&format!("{}.{}.{}", database, schema, name.object))
            }
            (_, Some(schema)) => {
                let database = self.current_database.as_deref()?;
                objects.get(&format!("{}.{}.{}", database, schema, name.object))
            }
            _ => {
                let suffix = format!(".{}", name.object);
                objects
                    .iter()
                    .find(|(fqn, _)| fqn.ends_with(&suffix) && fqn.matches('.').count() == 2)
                    .map(|(_, object)| object)
            }
        }
    }
}

impl Default for MockWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MockWarehouse {
    fn clone(&self) -> Self {
        Self {
            objects: Arc::clone(&self.objects),
            classify_errors: Arc::clone(&self.classify_errors),
            ddl_errors: Arc::clone(&self.ddl_errors),
            current_database: self.current_database.clone(),
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            counters: Arc::clone(&self.counters),
        }
    }
}

#[async_trait::async_trait]
impl WarehouseDriver for MockWarehouse {
    fn name(&self) -> &'static str {
        "Mock"
    }

    async fn test_connection(&self) -> Result<(), CatalogError> {
        self.simulate_latency().await;

        if self.fail_connection {
            Err(CatalogError::NetworkError(
                "Simulated connection failure".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn classify_object(&self, name: &QualifiedName) -> Result<Option<ObjectKind>, CatalogError> {
        self.counters.classify.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.classify_errors.read().await.get(&name.to_string()) {
            return Err(error.clone());
        }

        let objects = self.objects.read().await;
        Ok(self.lookup(&objects, name).map(|object| object.kind))
    }

    async fn fetch_ddl(&self, object: &ObjectIdentifier, _kind: ObjectKind) -> Result<Option<String>, CatalogError> {
        self.counters.ddl.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if let Some(error) = self.ddl_errors.read().await.get(&object.fqn()) {
            return Err(error.clone());
        }

        let objects = self.objects.read().await;
        Ok(objects.get(&object.fqn()).and_then(|entry| entry.ddl.clone()))
    }

    async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        let objects = self.objects.read().await;
        let mut databases: Vec<String> = objects
            .keys()
            .filter_map(|fqn| fqn.split('.').next().map(str::to_string))
            .collect();
        databases.dedup();
        Ok(databases)
    }

    async fn list_schemas(&self, database: &str) -> Result<Vec<String>, CatalogError> {
        let prefix = format!("{}.", database);
        let objects = self.objects.read().await;
        let mut schemas: Vec<String> = objects
            .keys()
            .filter_map(|fqn| fqn.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('.').next().map(str::to_string))
            .collect();
        schemas.dedup();
        Ok(schemas)
    }

    async fn list_objects(&self, database: &str, schema: &str) -> Result<Vec<CatalogObject>, CatalogError> {
        let prefix = format!("{}.{}.", database, schema);
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .filter_map(|(fqn, object)| {
                fqn.strip_prefix(&prefix)
                    .map(|name| CatalogObject::new(name, object.kind))
            })
            .collect())
    }
}

/// Builder for creating MockWarehouse with a predefined catalog
///
/// # Example
///
/// ```rust,ignore
/// let warehouse = MockWarehouseBuilder::new()
///     .with_table("D", "S", "T1")
///     .with_view("D", "S", "V1", "CREATE VIEW V1 AS SELECT * FROM D.S.T1")
///     .with_hidden_view("D", "S", "SECRET_V")
///     .with_current_database("D")
///     .build();
/// ```
pub struct MockWarehouseBuilder {
    objects: BTreeMap<String, MockObject>,
    classify_errors: BTreeMap<String, CatalogError>,
    ddl_errors: BTreeMap<String, CatalogError>,
    current_database: Option<String>,
    fail_connection: bool,
    latency_ms: u64,
}

impl MockWarehouseBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            objects: BTreeMap::new(),
            classify_errors: BTreeMap::new(),
            ddl_errors: BTreeMap::new(),
            current_database: None,
            fail_connection: false,
            latency_ms: 0,
        }
    }

    /// Add a table
    pub fn with_table(mut self, database: &str, schema: &str, name: &str) -> Self {
        self.objects.insert(
            format!("{}.{}.{}", database, schema, name),
            MockObject {
                kind: ObjectKind::Table,
                ddl: None,
            },
        );
        self
    }

    /// Add a view with its DDL
    pub fn with_view(mut self, database: &str, schema: &str, name: &str, ddl: &str) -> Self {
        self.objects.insert(
            format!("{}.{}.{}", database, schema, name),
            MockObject {
                kind: ObjectKind::View,
                ddl: Some(ddl.to_string()),
            },
        );
        self
    }

    /// Add a view whose DDL the session cannot read
    pub fn with_hidden_view(mut self, database: &str, schema: &str, name: &str) -> Self {
        self.objects.insert(
            format!("{}.{}.{}", database, schema, name),
            MockObject {
                kind: ObjectKind::View,
                ddl: None,
            },
        );
        self
    }

    /// Make `classify_object` fail for `name` (as the resolver passes it)
    pub fn with_classify_error(mut self, name: &str, error: CatalogError) -> Self {
        self.classify_errors.insert(name.to_string(), error);
        self
    }

    /// Make `fetch_ddl` fail for an object
    pub fn with_ddl_error(mut self, database: &str, schema: &str, name: &str, error: CatalogError) -> Self {
        self.ddl_errors.insert(format!("{}.{}.{}", database, schema, name), error);
        self
    }

    /// Session database used for two-part names
    pub fn with_current_database(mut self, database: &str) -> Self {
        self.current_database = Some(database.to_string());
        self
    }

    /// Configure connection failure
    pub fn with_connection_failure(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Configure latency
    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = latency_ms;
        self
    }

    /// Build the MockWarehouse
    pub fn build(self) -> MockWarehouse {
        MockWarehouse {
            objects: Arc::new(RwLock::new(self.objects)),
            classify_errors: Arc::new(RwLock::new(self.classify_errors)),
            ddl_errors: Arc::new(RwLock::new(self.ddl_errors)),
            current_database: self.current_database,
            fail_connection: self.fail_connection,
            latency_ms: self.latency_ms,
            counters: Arc::new(CallCounters::default()),
        }
    }
}

impl Default for MockWarehouseBuilder {
    fn default() -> Self {
        Self::new()
    }
}
