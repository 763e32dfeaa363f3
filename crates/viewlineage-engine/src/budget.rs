//! Per-request limits on how much work a traversal may do

use std::time::Duration;
use viewlineage_core::LineageSettings;

/// Caps the work of one lineage resolution.
///
/// Depth alone does not bound a traversal: a wide view graph can fan out to
/// thousands of objects well within the depth limit. Once either limit is
/// hit the remaining objects become `TRUNCATED` leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraversalBudget {
    /// Maximum number of objects classified against the warehouse
    pub max_nodes: Option<usize>,

    /// Wall-clock limit for the whole traversal
    pub deadline: Option<Duration>,
}

impl TraversalBudget {
    /// No limits besides depth and cycle detection
    pub fn unlimited() -> Self {
        Self {
            max_nodes: None,
            deadline: None,
        }
    }

    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.max_nodes = Some(max_nodes);
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Budget from the `[lineage]` configuration section
    pub fn from_settings(settings: &LineageSettings) -> Self {
        Self {
            max_nodes: Some(settings.max_nodes),
            deadline: settings.deadline_secs.map(Duration::from_secs),
        }
    }

    /// Reason the budget is spent, if it is
    pub fn exhausted(&self, resolved: usize, elapsed: Duration) -> Option<String> {
        if let Some(max) = self.max_nodes {
            if resolved >= max {
                return Some(format!("{} objects resolved", max));
            }
        }

        if let Some(deadline) = self.deadline {
            if elapsed >= deadline {
                return Some(format!("deadline of {}s reached", deadline.as_secs()));
            }
        }

        None
    }
}

impl Default for TraversalBudget {
    fn default() -> Self {
        Self::from_settings(&LineageSettings::default())
    }
}
