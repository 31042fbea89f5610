use crate::model::candidate::CandidateRecord;
use serde::{Deserialize, Serialize};

/// A pending upload as returned to the operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkBatch {
    /// Operation token addressing the pending upload.
    pub token: String,
    pub records: Vec<CandidateRecord>,
    pub any_errors: bool,
}

/// What confirming the batch would do right now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitPreview {
    pub persons_to_create: usize,
    pub tasks_to_create: usize,
    /// Indices of records that would be refused because they carry errors.
    pub blocked: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The record still had validation errors.
    Invalid,
    /// A unique constraint rejected the insert.
    IntegrityViolation,
    /// The referenced event or role no longer exists.
    ReferenceNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFailure {
    /// Position of the record in the batch.
    pub index: usize,
    pub kind: FailureKind,
    pub reason: String,
}

/// Outcome of a bulk commit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitReport {
    pub persons_created: usize,
    pub tasks_created: usize,
    /// Indices of the records that were committed.
    pub committed: Vec<usize>,
    pub failures: Vec<RecordFailure>,
}

/// Response to a confirmed commit.
///
/// `remaining` holds the records that were not committed, re-validated, and
/// is absent once the whole batch has been stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitResult {
    pub report: CommitReport,
    pub remaining: Option<BulkBatch>,
}
