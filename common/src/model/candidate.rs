use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The columns of a bulk upload row, in template order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateField {
    Personal,
    Family,
    Username,
    Email,
    Event,
    Role,
}

impl CandidateField {
    pub const ALL: [CandidateField; 6] = [
        CandidateField::Personal,
        CandidateField::Family,
        CandidateField::Username,
        CandidateField::Email,
        CandidateField::Event,
        CandidateField::Role,
    ];

    /// Column title used in the CSV header.
    pub fn column(self) -> &'static str {
        match self {
            CandidateField::Personal => "personal",
            CandidateField::Family => "family",
            CandidateField::Username => "username",
            CandidateField::Email => "email",
            CandidateField::Event => "event",
            CandidateField::Role => "role",
        }
    }
}

/// Field-level validation messages, at most one per field.
pub type FieldErrors = BTreeMap<CandidateField, String>;

/// One parsed upload row awaiting validation and commit.
///
/// Candidates live only in the pending-upload store. They are created by the
/// CSV parser, rewritten by the operator's edit pass, annotated by the
/// validator and dropped once committed or cancelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub personal: String,
    pub family: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Slug of the event the person should get a task at.
    pub event: Option<String>,
    /// Name of the role for that task.
    pub role: Option<String>,
    #[serde(default)]
    pub errors: FieldErrors,
}

impl CandidateRecord {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Whether committing this record also creates a task.
    pub fn wants_task(&self) -> bool {
        self.event.is_some() && self.role.is_some()
    }
}
