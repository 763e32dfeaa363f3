//! Lineage tree model
//!
//! A lineage graph is a nested tree: every node is keyed by the fully
//! qualified name of the object it describes and carries its children in
//! `sources`. Cycles never appear in the tree; the second encounter of an
//! object becomes a `LOOP` leaf.
//!
//! JSON shape (stable):
//!
//! ```json
//! {"DB.S.V1": {"type": "VIEW", "sources": [
//!     {"DB.S.T1": {"type": "TABLE", "sources": []}}
//! ]}}
//! ```

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

/// What a lineage node turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeType {
    /// A view; its sources were (or should have been) expanded
    View,

    /// A base table; always a leaf
    Table,

    /// Not found, ambiguous, or classification failed
    Unknown,

    /// Already expanded earlier in the same traversal
    Loop,

    /// Beyond the configured maximum depth
    MaxDepth,

    /// Not expanded because the traversal budget ran out
    Truncated,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::View => "VIEW",
            Self::Table => "TABLE",
            Self::Unknown => "UNKNOWN",
            Self::Loop => "LOOP",
            Self::MaxDepth => "MAX_DEPTH",
            Self::Truncated => "TRUNCATED",
        }
    }

    /// Sentinel types mark where the traversal stopped rather than what an
    /// object is.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Loop | Self::MaxDepth | Self::Truncated)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reasons a branch of the lineage tree was cut short.
///
/// None of these abort a traversal. Each one is recorded on the node where
/// it happened, either as a sentinel `type` with a `note` or as an `error`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LineageFailure {
    #[error("is_view error: {0}")]
    ClassificationFailure(String),

    #[error("GET_DDL error: {0}")]
    DdlFetchFailure(String),

    #[error("No DDL / permission denied")]
    DdlUnavailable,

    #[error("oracle failure: {0}")]
    OracleFailure(String),

    #[error("unresolvable source name: {0}")]
    UnresolvableName(String),

    #[error("Already visited")]
    CycleDetected,

    #[error("Max recursion reached")]
    DepthExceeded,

    #[error("traversal budget exhausted: {0}")]
    BudgetExhausted(String),
}

impl LineageFailure {
    /// Node type recorded for this failure
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::ClassificationFailure(_) | Self::UnresolvableName(_) => NodeType::Unknown,
            Self::DdlFetchFailure(_) | Self::DdlUnavailable | Self::OracleFailure(_) => NodeType::View,
            Self::CycleDetected => NodeType::Loop,
            Self::DepthExceeded => NodeType::MaxDepth,
            Self::BudgetExhausted(_) => NodeType::Truncated,
        }
    }

    /// Traversal limits are reported as notes; everything else is an error
    fn is_note(&self) -> bool {
        self.node_type().is_sentinel()
    }
}

/// One object in the lineage tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageNode {
    /// Fully qualified name (or the raw oracle text when it could not be
    /// qualified)
    pub name: String,

    pub node_type: NodeType,

    /// Children in the order the oracle listed them
    pub sources: Vec<LineageNode>,

    pub note: Option<String>,

    pub error: Option<String>,
}

impl LineageNode {
    /// A leaf with no diagnostics
    pub fn leaf(name: impl Into<String>, node_type: NodeType) -> Self {
        Self {
            name: name.into(),
            node_type,
            sources: Vec::new(),
            note: None,
            error: None,
        }
    }

    /// An expanded view
    pub fn view(name: impl Into<String>, sources: Vec<LineageNode>) -> Self {
        Self {
            sources,
            ..Self::leaf(name, NodeType::View)
        }
    }

    /// A terminal node describing why traversal stopped here
    pub fn from_failure(name: impl Into<String>, failure: &LineageFailure) -> Self {
        let node = Self::leaf(name, failure.node_type());
        if failure.is_note() {
            node.with_note(failure.to_string())
        } else {
            node.with_error(failure.to_string())
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.sources.is_empty()
    }

    /// Pre-order walk yielding `(depth, node)` with the root at depth 0
    pub fn walk(&self) -> Vec<(usize, &LineageNode)> {
        let mut out = Vec::new();
        let mut stack = vec![(0usize, self)];
        while let Some((depth, node)) = stack.pop() {
            out.push((depth, node));
            for child in node.sources.iter().rev() {
                stack.push((depth + 1, child));
            }
        }
        out
    }
}

#[derive(Serialize)]
struct NodeBodyRef<'a> {
    #[serde(rename = "type")]
    node_type: NodeType,
    sources: &'a [LineageNode],
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

#[derive(Deserialize)]
struct NodeBody {
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default)]
    sources: Vec<LineageNode>,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl Serialize for LineageNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(
            &self.name,
            &NodeBodyRef {
                node_type: self.node_type,
                sources: &self.sources,
                note: self.note.as_deref(),
                error: self.error.as_deref(),
            },
        )?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for LineageNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries: BTreeMap<String, NodeBody> = BTreeMap::deserialize(deserializer)?;
        if entries.len() != 1 {
            return Err(D::Error::custom(format!(
                "lineage node must have exactly one key, found {}",
                entries.len()
            )));
        }
        let (name, body) = entries
            .into_iter()
            .next()
            .ok_or_else(|| D::Error::custom("empty lineage node"))?;
        Ok(Self {
            name,
            node_type: body.node_type,
            sources: body.sources,
            note: body.note,
            error: body.error,
        })
    }
}

/// Lineage of one root object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageGraph {
    pub root: LineageNode,
}

impl LineageGraph {
    pub fn new(root: LineageNode) -> Self {
        Self { root }
    }

    /// Total number of nodes in the tree, sentinels included
    pub fn node_count(&self) -> usize {
        self.root.walk().len()
    }

    /// Depth of the deepest node (root is 0)
    pub fn depth(&self) -> usize {
        self.root
            .walk()
            .into_iter()
            .map(|(depth, _)| depth)
            .max()
            .unwrap_or(0)
    }

    /// All nodes with the given name, in pre-order
    pub fn find_all(&self, name: &str) -> Vec<&LineageNode> {
        self.root
            .walk()
            .into_iter()
            .map(|(_, node)| node)
            .filter(|node| node.name == name)
            .collect()
    }

    /// Nodes carrying an `error`
    pub fn errors(&self) -> Vec<&LineageNode> {
        self.root
            .walk()
            .into_iter()
            .map(|(_, node)| node)
            .filter(|node| node.error.is_some())
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Counters collected while resolving one lineage request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalStats {
    /// Objects classified against the warehouse
    pub nodes_resolved: usize,

    /// Source extraction calls issued
    pub oracle_calls: usize,

    /// Tokens reported by the oracle across all calls
    pub tokens_used: u64,

    /// At least one branch was cut by the traversal budget
    pub truncated: bool,
}

/// Result of a lineage request: the tree plus how it was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageReport {
    /// Fully qualified root name
    pub root: String,

    /// Depth bound the traversal ran with
    pub max_depth: usize,

    pub lineage: LineageGraph,

    pub stats: TraversalStats,
}

impl LineageReport {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Save to file
    pub fn save_to_file(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let json = self.to_json()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn sample() -> LineageGraph {
        LineageGraph::new(LineageNode::view(
            "D.S.V1",
            vec![
                LineageNode::leaf("D.S.T1", NodeType::Table),
                LineageNode::view(
                    "D.S.V2",
                    vec![LineageNode::from_failure("D.S.V1", &LineageFailure::CycleDetected)],
                ),
            ],
        ))
    }

    #[test]
    fn serializes_as_keyed_nesting() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(
            value,
            json!({
                "D.S.V1": {
                    "type": "VIEW",
                    "sources": [
                        {"D.S.T1": {"type": "TABLE", "sources": []}},
                        {"D.S.V2": {"type": "VIEW", "sources": [
                            {"D.S.V1": {"type": "LOOP", "sources": [], "note": "Already visited"}}
                        ]}}
                    ]
                }
            })
        );
    }

    #[test]
    fn deserializes_original_api_shape() {
        let value = json!({
            "D.S.V": {"type": "VIEW", "sources": [], "error": "No DDL / permission denied"}
        });
        let node: LineageNode = serde_json::from_value(value).unwrap();
        assert_eq!(node.name, "D.S.V");
        assert_eq!(node.node_type, NodeType::View);
        assert_eq!(node.error.as_deref(), Some("No DDL / permission denied"));
    }

    #[test]
    fn rejects_multi_key_node() {
        let value = json!({
            "A": {"type": "TABLE"},
            "B": {"type": "TABLE"}
        });
        assert!(serde_json::from_value::<LineageNode>(value).is_err());
    }

    #[test]
    fn failure_mapping() {
        let node = LineageNode::from_failure("X", &LineageFailure::DdlUnavailable);
        assert_eq!(node.node_type, NodeType::View);
        assert_eq!(node.error.as_deref(), Some("No DDL / permission denied"));
        assert!(node.note.is_none());

        let node = LineageNode::from_failure("X", &LineageFailure::DepthExceeded);
        assert_eq!(node.node_type, NodeType::MaxDepth);
        assert_eq!(node.note.as_deref(), Some("Max recursion reached"));

        let node = LineageNode::from_failure("X", &LineageFailure::OracleFailure("429".into()));
        assert_eq!(node.node_type, NodeType::View);
        assert_eq!(node.error.as_deref(), Some("oracle failure: 429"));
    }

    #[test]
    fn graph_queries() {
        let graph = sample();
        assert_eq!(graph.node_count(), 4);
        assert_eq!(graph.depth(), 2);
        assert_eq!(graph.find_all("D.S.V1").len(), 2);
        assert!(graph.errors().is_empty());

        let order: Vec<&str> = graph.root.walk().into_iter().map(|(_, n)| n.name.as_str()).collect();
        assert_eq!(order, vec!["D.S.V1", "D.S.T1", "D.S.V2", "D.S.V1"]);
    }
}
