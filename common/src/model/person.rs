use serde::{Deserialize, Serialize};

/// Row id of a person in the record store.
pub type PersonId = i64;

/// A durable person record as stored in the `persons` table.
///
/// `username` and `email` are both unique across the store when present.
/// Emails compare case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub id: PersonId,
    pub personal: String,
    pub family: String,
    pub username: Option<String>,
    pub email: Option<String>,
}

impl Person {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.personal, self.family)
    }
}
