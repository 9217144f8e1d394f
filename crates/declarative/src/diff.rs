//! Offline diff between declarations and tracked state
//!
//! Built from [`crate::plan`] results without any remote calls, so drift
//! is not visible here.

use crate::types::PlannedAction;
use serde::{Deserialize, Serialize};

/// A pending change for one resource address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// `<kind>.<name>`
    pub address: String,
    pub resource_type: String,
    pub action: PlannedAction,
}

impl ResourceDiff {
    pub fn is_addition(&self) -> bool {
        self.action == PlannedAction::Create
    }

    pub fn is_removal(&self) -> bool {
        self.action == PlannedAction::Delete
    }

    pub fn is_modification(&self) -> bool {
        matches!(self.action, PlannedAction::Update | PlannedAction::Replace)
    }
}

/// Diff summary statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
}

impl DiffSummary {
    pub fn from_diffs(diffs: &[ResourceDiff]) -> Self {
        let mut summary = Self::default();
        for diff in diffs {
            if diff.is_addition() {
                summary.additions += 1;
            } else if diff.is_removal() {
                summary.removals += 1;
            } else if diff.is_modification() {
                summary.modifications += 1;
            }
        }
        summary
    }

    /// Total number of changes
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}
