//! Warehouse sessions
//!
//! A session bundles one warehouse connection with the extractor and the
//! oracle credential used for its lineage requests. Sessions are registered
//! in a [`SessionManager`] under a random id and live until closed.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;
use viewlineage_catalog::{CatalogError, CatalogObject, WarehouseDriver};
use viewlineage_core::{LineageReport, LineageSettings, ObjectIdentifier};
use viewlineage_oracle::{ExtractionError, OracleCredential, SourceExtractor};

use crate::budget::TraversalBudget;
use crate::resolver::LineageResolver;

/// Opaque session handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SessionError::InvalidId(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Invalid oracle credential: {0}")]
    InvalidCredential(#[source] ExtractionError),

    #[error("Warehouse connection failed: {0}")]
    Connection(#[source] CatalogError),

    #[error("Session not found: {0}")]
    NotFound(SessionId),

    #[error("Invalid session id: {0}")]
    InvalidId(String),
}

/// One open warehouse connection plus what lineage requests need
pub struct Session {
    driver: Arc<dyn WarehouseDriver>,
    extractor: Arc<dyn SourceExtractor>,
    credential: OracleCredential,
    settings: LineageSettings,
}

impl Session {
    /// Create a session without checking anything
    pub fn new(
        driver: Arc<dyn WarehouseDriver>,
        extractor: Arc<dyn SourceExtractor>,
        credential: OracleCredential,
        settings: LineageSettings,
    ) -> Self {
        Self {
            driver,
            extractor,
            credential,
            settings,
        }
    }

    /// Create a session after validating the oracle credential and the
    /// warehouse connection, in that order
    pub async fn connect(
        driver: Arc<dyn WarehouseDriver>,
        extractor: Arc<dyn SourceExtractor>,
        credential: OracleCredential,
        settings: LineageSettings,
    ) -> Result<Self, SessionError> {
        extractor
            .validate(&credential)
            .await
            .map_err(SessionError::InvalidCredential)?;

        driver
            .test_connection()
            .await
            .map_err(SessionError::Connection)?;

        tracing::info!(driver = driver.name(), extractor = extractor.name(), "session connected");

        Ok(Self::new(driver, extractor, credential, settings))
    }

    pub fn driver(&self) -> &dyn WarehouseDriver {
        self.driver.as_ref()
    }

    pub fn settings(&self) -> &LineageSettings {
        &self.settings
    }

    pub async fn list_databases(&self) -> Result<Vec<String>, CatalogError> {
        self.driver.list_databases().await
    }

    pub async fn list_schemas(&self, database: &str) -> Result<Vec<String>, CatalogError> {
        self.driver.list_schemas(database).await
    }

    pub async fn list_objects(&self, database: &str, schema: &str) -> Result<Vec<CatalogObject>, CatalogError> {
        self.driver.list_objects(database, schema).await
    }

    /// Resolver configured with this session's traversal budget
    pub fn resolver(&self) -> LineageResolver {
        LineageResolver::new(Arc::clone(&self.driver), Arc::clone(&self.extractor))
            .with_budget(TraversalBudget::from_settings(&self.settings))
    }

    /// Lineage of `database.schema.object`.
    ///
    /// Without an explicit `max_depth` the configured request depth is used.
    pub async fn resolve_lineage(
        &self,
        database: &str,
        schema: &str,
        object: &str,
        max_depth: Option<usize>,
    ) -> LineageReport {
        let root = ObjectIdentifier::new(database, schema, object);
        let depth = max_depth.unwrap_or(self.settings.max_depth);
        self.resolver().resolve(&root, &self.credential, Some(depth)).await
    }
}

/// Registry of open sessions
#[derive(Default)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and return its id
    pub async fn open(&self, session: Session) -> SessionId {
        let id = SessionId::new();
        self.sessions.write().await.insert(id, Arc::new(session));
        tracing::debug!(session = %id, "session opened");
        id
    }

    pub async fn get(&self, id: &SessionId) -> Result<Arc<Session>, SessionError> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(SessionError::NotFound(*id))
    }

    /// Drop a session; returns whether it existed
    pub async fn close(&self, id: &SessionId) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!(session = %id, "session closed");
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewlineage_catalog::{MockWarehouse, MockWarehouseBuilder};
    use viewlineage_core::NodeType;
    use viewlineage_oracle::{MockOracle, OracleError, OracleSourceExtractor};

    fn extractor(oracle: MockOracle) -> Arc<dyn SourceExtractor> {
        Arc::new(OracleSourceExtractor::new(oracle))
    }

    #[tokio::test]
    async fn connect_validates_credential_first() {
        let oracle = MockOracle::new().failing(OracleError::Api {
            status: 401,
            body: "invalid api key".to_string(),
        });
        let warehouse = MockWarehouseBuilder::new().with_connection_failure().build();

        let result = Session::connect(
            Arc::new(warehouse),
            extractor(oracle),
            OracleCredential::new("bad"),
            LineageSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(SessionError::InvalidCredential(_))));
    }

    #[tokio::test]
    async fn connect_rejects_key_reported_invalid_in_text() {
        let oracle = MockOracle::new().with_default_reply("Error: Invalid API Key");
        let result = Session::connect(
            Arc::new(MockWarehouse::new()),
            extractor(oracle),
            OracleCredential::new("gsk_revoked"),
            LineageSettings::default(),
        )
        .await;
        assert!(matches!(
            result,
            Err(SessionError::InvalidCredential(ExtractionError::Oracle(OracleError::Reported(_))))
        ));
    }

    #[tokio::test]
    async fn connect_checks_warehouse() {
        let warehouse = MockWarehouseBuilder::new().with_connection_failure().build();
        let result = Session::connect(
            Arc::new(warehouse),
            extractor(MockOracle::new()),
            OracleCredential::new("k"),
            LineageSettings::default(),
        )
        .await;
        assert!(matches!(result, Err(SessionError::Connection(CatalogError::NetworkError(_)))));
    }

    #[tokio::test]
    async fn browsing_and_lineage() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("D", "S", "V", "SELECT * FROM T")
            .with_table("D", "S", "T")
            .build();
        let session = Session::connect(
            Arc::new(warehouse),
            extractor(MockOracle::new().with_default_reply("1. T")),
            OracleCredential::new("k"),
            LineageSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(session.list_databases().await.unwrap(), vec!["D"]);
        assert_eq!(session.list_schemas("D").await.unwrap(), vec!["S"]);
        assert_eq!(session.list_objects("D", "S").await.unwrap().len(), 2);

        let report = session.resolve_lineage("D", "S", "V", None).await;
        assert_eq!(report.max_depth, 8);
        assert_eq!(report.lineage.root.node_type, NodeType::View);
        assert_eq!(report.lineage.find_all("D.S.T")[0].node_type, NodeType::Table);

        let report = session.resolve_lineage("D", "S", "V", Some(2)).await;
        assert_eq!(report.max_depth, 2);
    }

    #[tokio::test]
    async fn manager_lifecycle() {
        let manager = SessionManager::new();
        let session = Session::new(
            Arc::new(MockWarehouse::new()),
            extractor(MockOracle::new()),
            OracleCredential::new("k"),
            LineageSettings::default(),
        );

        let id = manager.open(session).await;
        assert_eq!(manager.len().await, 1);
        assert!(manager.get(&id).await.is_ok());

        assert!(manager.close(&id).await);
        assert!(!manager.close(&id).await);
        assert!(manager.is_empty().await);
        assert!(matches!(manager.get(&id).await, Err(SessionError::NotFound(_))));
    }

    #[test]
    fn session_id_round_trips_through_text() {
        let id = SessionId::new();
        assert_eq!(id.to_string().parse::<SessionId>().unwrap(), id);
        assert!(matches!("nope".parse::<SessionId>(), Err(SessionError::InvalidId(_))));
    }
}
