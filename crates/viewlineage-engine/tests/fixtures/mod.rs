//! Test fixtures for lineage integration tests
//!
//! Each fixture returns a mock warehouse together with a scripted oracle
//! that answers for the DDL of every view in it. The oracle keys its
//! replies on a marker fragment unique to each view's DDL.

#![allow(dead_code)]

use std::sync::Arc;
use viewlineage_catalog::{MockWarehouse, MockWarehouseBuilder};
use viewlineage_engine::LineageResolver;
use viewlineage_oracle::{MockOracle, OracleCredential, OracleSourceExtractor};

pub fn credential() -> OracleCredential {
    OracleCredential::new("test-key")
}

pub fn resolver(warehouse: &MockWarehouse, oracle: &MockOracle) -> LineageResolver {
    LineageResolver::new(
        Arc::new(warehouse.clone()),
        Arc::new(OracleSourceExtractor::new(oracle.clone())),
    )
}

/// V1 reads T1 and V2; V2 reads T1 again
///
/// ```text
/// D.S.V1 ──> D.S.T1
///        └─> D.S.V2 ──> D.S.T1
/// ```
pub fn diamond() -> (MockWarehouse, MockOracle) {
    let warehouse = MockWarehouseBuilder::new()
        .with_view("D", "S", "V1", "CREATE VIEW V1 AS SELECT * FROM T1 JOIN V2_SRC")
        .with_view("D", "S", "V2", "CREATE VIEW V2 AS SELECT * FROM T1_ONLY")
        .with_table("D", "S", "T1")
        .build();
    let oracle = MockOracle::new()
        .with_reply("V2_SRC", "1. D.S.T1\n2. D.S.V2")
        .with_reply("T1_ONLY", "1. D.S.T1");
    (warehouse, oracle)
}

/// Same graph as [`diamond`], but the oracle answers with partial names
/// (`S.V2`, `T1`) that must be completed from the referencing view
pub fn diamond_partial_names() -> (MockWarehouse, MockOracle) {
    let warehouse = MockWarehouseBuilder::new()
        .with_view("D", "S", "V1", "CREATE VIEW V1 AS SELECT * FROM D.S.T1 JOIN S.V2")
        .with_view("D", "S", "V2", "CREATE VIEW V2 AS SELECT * FROM T1")
        .with_table("D", "S", "T1")
        .build();
    let oracle = MockOracle::new()
        .with_reply("JOIN S.V2", "1. D.S.T1\n2. S.V2")
        .with_reply("FROM T1", "1. T1");
    (warehouse, oracle)
}

/// A reads B and B reads A
pub fn two_view_cycle() -> (MockWarehouse, MockOracle) {
    let warehouse = MockWarehouseBuilder::new()
        .with_view("D", "S", "A", "CREATE VIEW A AS SELECT * FROM B_REF")
        .with_view("D", "S", "B", "CREATE VIEW B AS SELECT * FROM A_REF")
        .build();
    let oracle = MockOracle::new()
        .with_reply("B_REF", "1. B")
        .with_reply("A_REF", "1. A");
    (warehouse, oracle)
}

/// A straight chain `L0 -> L1 -> ... -> L{length}` ending in table `BASE`
pub fn chain(length: usize) -> (MockWarehouse, MockOracle) {
    let mut builder = MockWarehouseBuilder::new().with_table("D", "S", "BASE");
    let mut oracle = MockOracle::new();

    for level in 0..=length {
        let name = format!("L{}", level);
        let marker = format!("CHAIN_MARK_{}_END", level);
        builder = builder.with_view("D", "S", &name, &format!("SELECT * FROM {}", marker));

        let next = if level == length {
            "BASE".to_string()
        } else {
            format!("L{}", level + 1)
        };
        oracle = oracle.with_reply(marker, format!("1. {}", next));
    }

    (builder.build(), oracle)
}

/// One root view reading `width` views, each reading its own table
pub fn fan_out(width: usize) -> (MockWarehouse, MockOracle) {
    let mut builder = MockWarehouseBuilder::new();
    let mut oracle = MockOracle::new();
    let mut root_sources = Vec::new();

    for i in 0..width {
        let view = format!("W{}", i);
        let marker = format!("FAN_MARK_{}_END", i);
        builder = builder
            .with_view("D", "S", &view, &format!("SELECT * FROM {}", marker))
            .with_table("D", "S", &format!("T{}", i));
        oracle = oracle.with_reply(marker, format!("1. T{}", i));
        root_sources.push(format!("{}. {}", i + 1, view));
    }

    builder = builder.with_view("D", "S", "ROOT", "SELECT * FROM FAN_ROOT");
    oracle = oracle.with_reply("FAN_ROOT", root_sources.join("\n"));

    (builder.build(), oracle)
}
