//! Warehouse catalog drivers for lineage discovery
//!
//! A driver answers the metadata questions the lineage resolver asks: is this
//! object a view or a table, and what is the DDL of this view. It also lists
//! databases, schemas and objects for browsing.
//!
//! ## Features
//!
//! Enable warehouse support via Cargo features:
//! - `snowflake` - Snowflake support
//!
//! The in-memory [`MockWarehouse`] is always available.
//!
//! ## Example
//!
//! ```rust,ignore
//! use viewlineage_catalog::{SnowflakeDriver, WarehouseDriver};
//! use viewlineage_core::QualifiedName;
//!
//! let driver = SnowflakeDriver::new("xy12345.us-east-1", "user", "pass")
//!     .with_warehouse("COMPUTE_WH")
//!     .build()?;
//! let name = QualifiedName::parse("SALES.PUBLIC.ORDERS_V").unwrap();
//! let kind = driver.classify_object(&name).await?;
//! ```

pub mod adapter;
pub mod query;
pub mod snowflake;
pub mod mock;

pub use adapter::{WarehouseDriver, CatalogError, ObjectKind, CatalogObject};
pub use snowflake::{SnowflakeDriver, SnowflakeDriverBuilder};
pub use mock::{MockWarehouse, MockWarehouseBuilder};
