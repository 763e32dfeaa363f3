//! Recursive lineage discovery
//!
//! For each object the resolver asks the warehouse what it is, fetches the
//! DDL of views, has the extractor list the view's sources and then walks
//! those sources depth-first in the order they were listed.
//!
//! The walk is driven by an explicit stack of frames, one per view being
//! expanded, so deep lineage never grows the call stack. Every failure is
//! recorded on the node where it happened; `resolve` itself cannot fail.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use viewlineage_catalog::{ObjectKind, WarehouseDriver};
use viewlineage_core::{
    LineageFailure, LineageGraph, LineageNode, LineageReport, NodeType, ObjectIdentifier,
    QualifiedName, TraversalStats,
};
use viewlineage_oracle::{OracleCredential, SourceExtractor};

use crate::budget::TraversalBudget;

/// Depth bound used when the caller does not pass one
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Lineage resolver over a warehouse driver and a source extractor
#[derive(Clone)]
pub struct LineageResolver {
    driver: Arc<dyn WarehouseDriver>,
    extractor: Arc<dyn SourceExtractor>,
    budget: TraversalBudget,
}

/// A view whose sources are being walked
struct Frame {
    object: ObjectIdentifier,
    depth: usize,
    pending: std::vec::IntoIter<String>,
    children: Vec<LineageNode>,
}

impl Frame {
    fn into_node(self) -> LineageNode {
        LineageNode::view(self.object.fqn(), self.children)
    }
}

enum Visit {
    /// Terminal node, nothing left to walk
    Done(LineageNode),

    /// View with sources still to be walked
    Expand(Frame),
}

/// State owned by a single `resolve` call
struct Traversal<'a> {
    credential: &'a OracleCredential,
    max_depth: usize,
    visited: HashSet<String>,
    stats: TraversalStats,
    started: Instant,
}

impl LineageResolver {
    pub fn new(driver: Arc<dyn WarehouseDriver>, extractor: Arc<dyn SourceExtractor>) -> Self {
        Self {
            driver,
            extractor,
            budget: TraversalBudget::default(),
        }
    }

    pub fn with_budget(mut self, budget: TraversalBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn budget(&self) -> &TraversalBudget {
        &self.budget
    }

    /// Resolve the lineage of `root`.
    ///
    /// `max_depth` bounds how far below the root views are expanded;
    /// [`DEFAULT_MAX_DEPTH`] is used when it is `None`. Each call starts with
    /// an empty visited set, so repeated calls against an unchanged
    /// warehouse return the same tree.
    pub async fn resolve(
        &self,
        root: &ObjectIdentifier,
        credential: &OracleCredential,
        max_depth: Option<usize>,
    ) -> LineageReport {
        let max_depth = max_depth.unwrap_or(DEFAULT_MAX_DEPTH);

        tracing::info!(
            root = %root,
            max_depth,
            driver = self.driver.name(),
            extractor = self.extractor.name(),
            "resolving lineage"
        );

        let mut traversal = Traversal {
            credential,
            max_depth,
            visited: HashSet::new(),
            stats: TraversalStats::default(),
            started: Instant::now(),
        };

        let node = self.walk(root, &mut traversal).await;
        let stats = traversal.stats;

        tracing::info!(
            root = %root,
            resolved = stats.nodes_resolved,
            oracle_calls = stats.oracle_calls,
            tokens = stats.tokens_used,
            truncated = stats.truncated,
            elapsed_ms = traversal.started.elapsed().as_millis() as u64,
            "lineage resolved"
        );

        LineageReport {
            root: root.fqn(),
            max_depth,
            lineage: LineageGraph::new(node),
            stats,
        }
    }

    /// Depth-first walk from `root` using a stack of open views
    async fn walk(&self, root: &ObjectIdentifier, traversal: &mut Traversal<'_>) -> LineageNode {
        let mut stack = match self.visit(root.clone(), 0, traversal).await {
            Visit::Done(node) => return node,
            Visit::Expand(frame) => vec![frame],
        };

        let mut finished = None;

        while let Some(top) = stack.last_mut() {
            match top.pending.next() {
                Some(candidate) => {
                    let depth = top.depth + 1;
                    let visit = match QualifiedName::parse(&candidate) {
                        // Missing parts come from the view that referenced
                        // the source, not from the root.
                        Some(name) => {
                            let object = name.resolve(&top.object.database, &top.object.schema);
                            self.visit(object, depth, traversal).await
                        }
                        None => {
                            tracing::warn!(candidate = %candidate, "unresolvable source name");
                            let failure = LineageFailure::UnresolvableName(candidate.clone());
                            Visit::Done(LineageNode::from_failure(candidate, &failure))
                        }
                    };

                    match visit {
                        Visit::Done(node) => top.children.push(node),
                        Visit::Expand(frame) => stack.push(frame),
                    }
                }
                None => {
                    if let Some(frame) = stack.pop() {
                        let node = frame.into_node();
                        match stack.last_mut() {
                            Some(parent) => parent.children.push(node),
                            None => finished = Some(node),
                        }
                    }
                }
            }
        }

        finished.unwrap_or_else(|| LineageNode::leaf(root.fqn(), NodeType::View))
    }

    /// Work out what one object is, stopping at the first limit or failure
    async fn visit(&self, object: ObjectIdentifier, depth: usize, traversal: &mut Traversal<'_>) -> Visit {
        let key = object.fqn();

        if traversal.visited.contains(&key) {
            tracing::debug!(object = %key, depth, "already visited");
            return done(key, LineageFailure::CycleDetected);
        }

        if depth > traversal.max_depth {
            tracing::debug!(object = %key, depth, "max depth reached");
            return done(key, LineageFailure::DepthExceeded);
        }

        if let Some(reason) = self
            .budget
            .exhausted(traversal.stats.nodes_resolved, traversal.started.elapsed())
        {
            tracing::warn!(object = %key, reason = %reason, "traversal budget exhausted");
            traversal.stats.truncated = true;
            return done(key, LineageFailure::BudgetExhausted(reason));
        }

        traversal.stats.nodes_resolved += 1;

        let kind = match self.driver.classify_object(&QualifiedName::from(object.clone())).await {
            Ok(Some(kind)) => kind,
            Ok(None) => {
                tracing::debug!(object = %key, "object not found");
                return Visit::Done(LineageNode::leaf(key, NodeType::Unknown));
            }
            Err(e) => {
                tracing::warn!(object = %key, error = %e, "classification failed");
                return done(key, LineageFailure::ClassificationFailure(e.to_string()));
            }
        };

        if kind == ObjectKind::Table {
            tracing::debug!(object = %key, depth, "table");
            return Visit::Done(LineageNode::leaf(key, NodeType::Table));
        }

        // Only views can lead back to themselves
        traversal.visited.insert(key.clone());

        let ddl = match self.driver.fetch_ddl(&object, ObjectKind::View).await {
            Ok(Some(ddl)) if !ddl.trim().is_empty() => ddl,
            Ok(_) => {
                tracing::warn!(object = %key, "no DDL returned");
                return done(key, LineageFailure::DdlUnavailable);
            }
            Err(e) => {
                tracing::warn!(object = %key, error = %e, "DDL fetch failed");
                return done(key, LineageFailure::DdlFetchFailure(e.to_string()));
            }
        };

        traversal.stats.oracle_calls += 1;
        let extraction = match self
            .extractor
            .extract(traversal.credential, &ddl, &object.context())
            .await
        {
            Ok(extraction) => extraction,
            Err(e) => {
                tracing::warn!(object = %key, error = %e, "source extraction failed");
                return done(key, LineageFailure::OracleFailure(e.to_string()));
            }
        };
        traversal.stats.tokens_used += extraction.tokens_used;

        tracing::debug!(object = %key, depth, sources = extraction.sources.len(), "view expanded");

        Visit::Expand(Frame {
            object,
            depth,
            pending: extraction.sources.into_iter(),
            children: Vec::new(),
        })
    }
}

fn done(key: String, failure: LineageFailure) -> Visit {
    Visit::Done(LineageNode::from_failure(key, &failure))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use viewlineage_catalog::MockWarehouseBuilder;
    use viewlineage_oracle::{MockOracle, OracleSourceExtractor};

    fn resolver(warehouse: viewlineage_catalog::MockWarehouse, oracle: MockOracle) -> LineageResolver {
        LineageResolver::new(
            Arc::new(warehouse),
            Arc::new(OracleSourceExtractor::new(oracle)),
        )
    }

    fn key() -> OracleCredential {
        OracleCredential::new("test-key")
    }

    #[tokio::test]
    async fn table_root_is_a_single_leaf() {
        let warehouse = MockWarehouseBuilder::new().with_table("D", "S", "T").build();
        let oracle = MockOracle::new();
        let report = resolver(warehouse, oracle.clone())
            .resolve(&ObjectIdentifier::new("D", "S", "T"), &key(), None)
            .await;

        assert_eq!(report.lineage.root, LineageNode::leaf("D.S.T", NodeType::Table));
        assert_eq!(report.max_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(report.stats.nodes_resolved, 1);
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_root_is_unknown() {
        let report = resolver(MockWarehouseBuilder::new().build(), MockOracle::new())
            .resolve(&ObjectIdentifier::new("D", "S", "GONE"), &key(), Some(3))
            .await;

        assert_eq!(report.lineage.root, LineageNode::leaf("D.S.GONE", NodeType::Unknown));
        assert_eq!(report.max_depth, 3);
    }

    #[tokio::test]
    async fn partial_names_use_the_referencing_view() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("A", "X", "ROOT", "SELECT * FROM B.Y.MID")
            .with_view("B", "Y", "MID", "SELECT * FROM BASE JOIN Z.OTHER")
            .with_table("B", "Y", "BASE")
            .with_table("B", "Z", "OTHER")
            .build();
        let oracle = MockOracle::new()
            .with_reply("B.Y.MID", "1. B.Y.MID")
            .with_reply("FROM BASE", "1. BASE\n2. Z.OTHER");

        let report = resolver(warehouse, oracle)
            .resolve(&ObjectIdentifier::new("A", "X", "ROOT"), &key(), None)
            .await;

        let expected = LineageNode::view(
            "A.X.ROOT",
            vec![LineageNode::view(
                "B.Y.MID",
                vec![
                    LineageNode::leaf("B.Y.BASE", NodeType::Table),
                    LineageNode::leaf("B.Z.OTHER", NodeType::Table),
                ],
            )],
        );
        assert_eq!(report.lineage.root, expected);
    }

    #[tokio::test]
    async fn self_reference_is_a_loop() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("D", "S", "V", "SELECT * FROM V")
            .build();
        let oracle = MockOracle::new().with_default_reply("1. V");

        let report = resolver(warehouse, oracle)
            .resolve(&ObjectIdentifier::new("D", "S", "V"), &key(), None)
            .await;

        let expected = LineageNode::view(
            "D.S.V",
            vec![LineageNode::leaf("D.S.V", NodeType::Loop).with_note("Already visited")],
        );
        assert_eq!(report.lineage.root, expected);
    }

    #[tokio::test]
    async fn zero_depth_expands_only_the_root() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("D", "S", "V", "SELECT * FROM T")
            .with_table("D", "S", "T")
            .build();
        let oracle = MockOracle::new().with_default_reply("1. D.S.T");

        let report = resolver(warehouse, oracle)
            .resolve(&ObjectIdentifier::new("D", "S", "V"), &key(), Some(0))
            .await;

        let expected = LineageNode::view(
            "D.S.V",
            vec![LineageNode::leaf("D.S.T", NodeType::MaxDepth).with_note("Max recursion reached")],
        );
        assert_eq!(report.lineage.root, expected);
    }

    #[tokio::test]
    async fn empty_ddl_counts_as_missing() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("D", "S", "V", "   ")
            .build();
        let oracle = MockOracle::new();

        let report = resolver(warehouse, oracle.clone())
            .resolve(&ObjectIdentifier::new("D", "S", "V"), &key(), None)
            .await;

        assert_eq!(
            report.lineage.root,
            LineageNode::leaf("D.S.V", NodeType::View).with_error("No DDL / permission denied")
        );
        assert_eq!(oracle.call_count(), 0);
    }

    #[tokio::test]
    async fn tokens_are_accumulated() {
        let warehouse = MockWarehouseBuilder::new()
            .with_view("D", "S", "V1", "SELECT * FROM V2")
            .with_view("D", "S", "V2", "SELECT * FROM T")
            .with_table("D", "S", "T")
            .build();
        let oracle = MockOracle::new()
            .with_reply("FROM V2", "1. V2")
            .with_reply("FROM T", "1. T")
            .with_tokens_per_call(50);

        let report = resolver(warehouse, oracle)
            .resolve(&ObjectIdentifier::new("D", "S", "V1"), &key(), None)
            .await;

        assert_eq!(report.stats.oracle_calls, 2);
        assert_eq!(report.stats.tokens_used, 100);
        assert_eq!(report.stats.nodes_resolved, 3);
        assert!(!report.stats.truncated);
    }
}
