use crate::model::candidate::CandidateRecord;
use crate::model::person::PersonId;
use serde::Deserialize;

/// Operator's edited values for one upload row.
///
/// Empty strings clear optional fields, so dropping an event is done by
/// sending `""`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct CandidateEdit {
    pub personal: String,
    pub family: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl From<CandidateEdit> for CandidateRecord {
    fn from(edit: CandidateEdit) -> Self {
        CandidateRecord {
            personal: edit.personal.trim().to_string(),
            family: edit.family.trim().to_string(),
            username: non_empty(edit.username),
            email: non_empty(edit.email),
            event: non_empty(edit.event),
            role: non_empty(edit.role),
            errors: Default::default(),
        }
    }
}

/// Request payload for replacing the rows of a pending upload.
#[derive(Deserialize, Debug)]
pub struct UpdateRecordsRequest {
    pub records: Vec<CandidateEdit>,
}

/// Request payload for proposing a merge of `source` into `target`.
#[derive(Deserialize, Debug)]
pub struct ProposeMergeRequest {
    pub source: PersonId,
    pub target: PersonId,
}
