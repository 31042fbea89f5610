use crate::model::person::{Person, PersonId};
use serde::{Deserialize, Serialize};

/// Lifecycle of a merge request.
///
/// `Proposed` -> `Confirmed` -> `Applied` | `Rejected`. The last two are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeState {
    Proposed,
    Confirmed,
    Applied,
    Rejected,
}

impl MergeState {
    pub fn is_terminal(self) -> bool {
        matches!(self, MergeState::Applied | MergeState::Rejected)
    }
}

/// Two person identities under consideration for a merge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub token: String,
    /// Person to be removed.
    pub source: PersonId,
    /// Person to be kept.
    pub target: PersonId,
    pub state: MergeState,
    /// Set once the operator has been served the reconciliation preview.
    /// Confirmation requires it.
    #[serde(default)]
    pub previewed: bool,
}

/// A reassignment that would break a unique constraint on `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    /// Name of the blocking constraint, e.g. `award(person, badge)`.
    pub constraint: String,
    /// Human readable description of the clashing item.
    pub detail: String,
}

/// Reconciliation preview shown to the operator before confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergePreview {
    pub source: Person,
    pub target: Person,
    pub awards_moved: usize,
    pub tasks_moved: usize,
    pub qualifications_moved: usize,
    /// Source qualifications dropped because the target already holds the lesson.
    pub qualifications_dropped: usize,
    pub domains_moved: usize,
    pub domains_dropped: usize,
    pub conflicts: Vec<MergeConflict>,
}

/// Counts reported once a merge has been applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeOutcome {
    pub awards_moved: usize,
    pub tasks_moved: usize,
    pub qualifications_moved: usize,
    pub qualifications_dropped: usize,
    pub domains_moved: usize,
    pub domains_dropped: usize,
}

/// A pending merge request together with its current preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReview {
    pub request: MergeRequest,
    pub preview: MergePreview,
}

/// Response to a successfully applied merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeApplied {
    pub request: MergeRequest,
    pub outcome: MergeOutcome,
}
