//! Error types for ingestion, commit and merge, plus their HTTP mapping.
//!
//! Field-level validation problems are not errors here: they are collected on
//! each `CandidateRecord` and never abort a batch.

use actix_web::HttpResponse;
use common::model::bulk::CommitReport;
use common::model::merge::{MergeConflict, MergeState};
use common::model::person::PersonId;
use log::error;
use thiserror::Error;

/// Returns the SQLite message when `err` is a constraint violation.
pub fn constraint_violation(err: &rusqlite::Error) -> Option<String> {
    match err {
        rusqlite::Error::SqliteFailure(e, msg)
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Some(msg.clone().unwrap_or_else(|| e.to_string()))
        }
        _ => None,
    }
}

#[derive(Error, Debug)]
pub enum IngestError {
    /// The upload could not be decoded or is not well-formed CSV.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error(
        "The following required fields were not found in the uploaded file: {}",
        .0.join(", ")
    )]
    MissingColumns(Vec<String>),
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::MalformedInput(format!("error processing uploaded CSV file: {}", err))
    }
}

/// Failure to commit a single candidate record.
#[derive(Error, Debug)]
pub enum CommitError {
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("Reference not found: {0}")]
    ReferenceNotFound(String),

    #[error("Database error: {0}")]
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for CommitError {
    fn from(err: rusqlite::Error) -> Self {
        match constraint_violation(&err) {
            Some(msg) => CommitError::IntegrityViolation(msg),
            None => CommitError::Store(err),
        }
    }
}

/// A store error stopped a bulk commit part way through.
///
/// `report` describes the records committed before the failure; those stay
/// committed.
#[derive(Error, Debug)]
#[error("Bulk commit aborted after {} record(s): {source}", .report.persons_created)]
pub struct CommitAborted {
    pub report: CommitReport,
    pub source: rusqlite::Error,
}

fn describe_conflicts(conflicts: &[MergeConflict]) -> String {
    conflicts
        .iter()
        .map(|c| format!("{} ({})", c.constraint, c.detail))
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Cannot merge a person with themselves")]
    SelfMerge,

    #[error("Person {0} not found")]
    NotFound(PersonId),

    #[error("Merge blocked by {}", describe_conflicts(.0))]
    Conflict(Vec<MergeConflict>),

    #[error("Merge request is {from:?} and cannot become {to:?}")]
    InvalidTransition { from: MergeState, to: MergeState },

    #[error("Merge request must be previewed before it is confirmed")]
    NotPreviewed,

    #[error("Database error: {0}")]
    Store(rusqlite::Error),
}

impl From<rusqlite::Error> for MergeError {
    fn from(err: rusqlite::Error) -> Self {
        match constraint_violation(&err) {
            Some(msg) => MergeError::Conflict(vec![MergeConflict {
                constraint: msg,
                detail: "reassignment rejected by the record store".to_string(),
            }]),
            None => MergeError::Store(err),
        }
    }
}

/// Errors surfaced by the HTTP handlers.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Pending operation {0} not found or expired")]
    UnknownToken(String),

    #[error("Pending batch {0} changed while it was being validated, reload it")]
    StaleBatch(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    CommitAborted(#[from] CommitAborted),

    #[error("Database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl ServiceError {
    /// Converts the error into the response returned to the operator.
    pub fn to_response(&self) -> HttpResponse {
        let body = format!("Error: {}", self);
        match self {
            ServiceError::BadRequest(_)
            | ServiceError::Ingest(_)
            | ServiceError::Merge(MergeError::SelfMerge) => HttpResponse::BadRequest().body(body),
            ServiceError::UnknownToken(_) | ServiceError::Merge(MergeError::NotFound(_)) => {
                HttpResponse::NotFound().body(body)
            }
            ServiceError::Merge(MergeError::Conflict(_))
            | ServiceError::Merge(MergeError::InvalidTransition { .. })
            | ServiceError::Merge(MergeError::NotPreviewed)
            | ServiceError::StaleBatch(_) => {
                HttpResponse::Conflict().body(body)
            }
            ServiceError::Merge(MergeError::Store(_))
            | ServiceError::CommitAborted(_)
            | ServiceError::Store(_)
            | ServiceError::Join(_) => {
                error!("{}", body);
                HttpResponse::InternalServerError().body(body)
            }
        }
    }
}
