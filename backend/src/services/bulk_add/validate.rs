//! Field and store checks for uploaded candidates.
//!
//! Validation never fails a batch: every problem is written into the record's
//! error set so the operator can fix it and run the checks again. Running the
//! checks twice over the same records gives the same error sets, and the store
//! is only read.

use crate::db::persons;
use common::model::candidate::{CandidateField, CandidateRecord, FieldErrors};
use rayon::prelude::*;
use regex::Regex;
use rusqlite::Connection;
use std::collections::HashMap;

pub const USERNAME_MAX_LEN: usize = 39;

const REQUIRED: &str = "This field is required.";
const EVENT_ROLE_PAIR: &str = "Must have both: event and role.";

/// Compiled patterns used by the validator. Built once at startup.
#[derive(Debug, Clone)]
pub struct ValidationRules {
    username_chars: Regex,
    email: Regex,
}

impl ValidationRules {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(ValidationRules {
            username_chars: Regex::new(r"^[a-z0-9-]+$")?,
            email: Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$")?,
        })
    }

    /// Checks the username format: lowercase letters, digits and single
    /// hyphens, neither leading nor trailing, at most 39 characters.
    pub fn check_username(&self, username: &str) -> Result<(), String> {
        if username.len() > USERNAME_MAX_LEN {
            return Err(format!(
                "Username must be at most {} characters long.",
                USERNAME_MAX_LEN
            ));
        }
        if !self.username_chars.is_match(username) {
            return Err(
                "Username may only contain lowercase letters, digits and hyphens.".to_string(),
            );
        }
        if username.starts_with('-') || username.ends_with('-') {
            return Err("Username cannot begin or end with a hyphen.".to_string());
        }
        if username.contains("--") {
            return Err("Username cannot contain consecutive hyphens.".to_string());
        }
        Ok(())
    }

    pub fn check_email(&self, email: &str) -> Result<(), String> {
        if self.email.is_match(email) {
            Ok(())
        } else {
            Err("Enter a valid email address.".to_string())
        }
    }

    /// Checks that need nothing but the record itself.
    pub fn check_fields(&self, record: &CandidateRecord) -> FieldErrors {
        let mut errors = FieldErrors::new();
        if record.personal.trim().is_empty() {
            errors.insert(CandidateField::Personal, REQUIRED.to_string());
        }
        if record.family.trim().is_empty() {
            errors.insert(CandidateField::Family, REQUIRED.to_string());
        }
        if let Some(Err(msg)) = record.username.as_deref().map(|u| self.check_username(u)) {
            errors.insert(CandidateField::Username, msg);
        }
        if let Some(Err(msg)) = record.email.as_deref().map(|e| self.check_email(e)) {
            errors.insert(CandidateField::Email, msg);
        }
        if record.event.is_some() != record.role.is_some() {
            errors.insert(CandidateField::Event, EVENT_ROLE_PAIR.to_string());
            errors.insert(CandidateField::Role, EVENT_ROLE_PAIR.to_string());
        }
        errors
    }
}

/// Recomputes every record's error set in place.
///
/// Field checks run in parallel; store lookups then run in file order on the
/// given connection. A username or email repeated within the batch is flagged
/// on every occurrence after the first. Returns whether any record is in error.
pub fn verify_candidates(
    conn: &Connection,
    rules: &ValidationRules,
    records: &mut [CandidateRecord],
) -> rusqlite::Result<bool> {
    records
        .par_iter_mut()
        .for_each(|record| record.errors = rules.check_fields(record));

    let mut seen_usernames: HashMap<String, usize> = HashMap::new();
    let mut seen_emails: HashMap<String, usize> = HashMap::new();

    for (index, record) in records.iter_mut().enumerate() {
        if let Some(username) = record.username.clone() {
            if !record.errors.contains_key(&CandidateField::Username) {
                if let Some(first) = seen_usernames.get(&username) {
                    record.errors.insert(
                        CandidateField::Username,
                        format!("Username is already used by row {} of this upload.", first + 1),
                    );
                } else if persons::username_taken(conn, &username)? {
                    record.errors.insert(
                        CandidateField::Username,
                        "A person with this username already exists.".to_string(),
                    );
                }
            }
            seen_usernames.entry(username).or_insert(index);
        }

        if let Some(email) = record.email.as_deref().map(str::to_lowercase) {
            if !record.errors.contains_key(&CandidateField::Email) {
                if let Some(first) = seen_emails.get(&email) {
                    record.errors.insert(
                        CandidateField::Email,
                        format!("Email is already used by row {} of this upload.", first + 1),
                    );
                } else if persons::email_taken(conn, &email)? {
                    record.errors.insert(
                        CandidateField::Email,
                        "A person with this email already exists.".to_string(),
                    );
                }
            }
            seen_emails.entry(email).or_insert(index);
        }

        if let (Some(slug), Some(role)) = (record.event.as_deref(), record.role.as_deref()) {
            if persons::event_id_by_slug(conn, slug)?.is_none() {
                record.errors.insert(
                    CandidateField::Event,
                    format!("Event with slug {} does not exist.", slug),
                );
            }
            if persons::role_id_by_name(conn, role)?.is_none() {
                record.errors.insert(
                    CandidateField::Role,
                    format!("Role with name {} does not exist.", role),
                );
            }
        }
    }

    Ok(records.iter().any(CandidateRecord::has_errors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    fn rules() -> ValidationRules {
        ValidationRules::new().unwrap()
    }

    fn candidate(personal: &str, family: &str, username: Option<&str>, email: Option<&str>) -> CandidateRecord {
        CandidateRecord {
            personal: personal.to_string(),
            family: family.to_string(),
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn accepted_usernames() {
        let rules = rules();
        let max = "a".repeat(USERNAME_MAX_LEN);
        for name in ["a", "jane-doe", "j4n3", "a-b-c", "123", max.as_str()] {
            assert_eq!(rules.check_username(name), Ok(()), "{}", name);
        }
    }

    #[test]
    fn rejected_usernames() {
        let rules = rules();
        let too_long = "a".repeat(USERNAME_MAX_LEN + 1);
        for name in [
            "",
            "-bad--name-",
            "-jane",
            "jane-",
            "ja--ne",
            "Jane",
            "jane_doe",
            "jane doe",
            "jané",
            too_long.as_str(),
        ] {
            assert!(rules.check_username(name).is_err(), "{}", name);
        }
    }

    #[test]
    fn every_accepted_username_is_in_the_allowed_shape() {
        let rules = rules();
        let alphabet = ['a', 'z', '0', '-', 'A', '_'];
        // all strings up to length 4 over a small alphabet
        let mut pending = vec![String::new()];
        while let Some(current) = pending.pop() {
            if rules.check_username(&current).is_ok() {
                assert!(current.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
                assert!(!current.is_empty() && current.len() <= USERNAME_MAX_LEN);
                assert!(!current.starts_with('-') && !current.ends_with('-'));
                assert!(!current.contains("--"));
            }
            if current.len() < 4 {
                for c in alphabet {
                    pending.push(format!("{}{}", current, c));
                }
            }
        }
    }

    #[test]
    fn emails() {
        let rules = rules();
        assert!(rules.check_email("jane@x.org").is_ok());
        assert!(rules.check_email("jane.doe+tag@mail.x.org").is_ok());
        for bad in ["jane", "jane@", "@x.org", "jane@x", "ja ne@x.org", "a@b@c.org", "jane@x..org"] {
            assert!(rules.check_email(bad).is_err(), "{}", bad);
        }
    }

    #[test]
    fn names_are_required() {
        let errors = rules().check_fields(&candidate("  ", "", None, None));
        assert_eq!(errors.get(&CandidateField::Personal).map(String::as_str), Some(REQUIRED));
        assert_eq!(errors.get(&CandidateField::Family).map(String::as_str), Some(REQUIRED));
    }

    #[test]
    fn event_without_role_flags_the_pair() {
        let mut record = candidate("Jane", "Doe", None, None);
        record.event = Some("2016-01-01-hogwarts".to_string());
        let errors = rules().check_fields(&record);

        assert!(errors.contains_key(&CandidateField::Event));
        assert!(errors.contains_key(&CandidateField::Role));
    }

    #[test]
    fn store_duplicates_and_unknown_references() {
        let conn = fixtures::open_in_memory();
        crate::db::persons::insert_person(&conn, "Harry", "Potter", Some("harry"), Some("harry@hogwarts.edu"))
            .unwrap();
        fixtures::event(&conn, "2016-01-01-hogwarts");

        let mut records = vec![
            candidate("Harry", "Potter", Some("harry"), Some("HARRY@hogwarts.edu")),
            {
                let mut r = candidate("Ron", "Weasley", Some("ron"), None);
                r.event = Some("2016-01-01-hogwarts".to_string());
                r.role = Some("wizard".to_string());
                r
            },
            {
                let mut r = candidate("Ginny", "Weasley", Some("ginny"), None);
                r.event = Some("no-such-event".to_string());
                r.role = Some("helper".to_string());
                r
            },
        ];
        let any_errors = verify_candidates(&conn, &rules(), &mut records).unwrap();

        assert!(any_errors);
        assert!(records[0].errors.contains_key(&CandidateField::Username));
        assert!(records[0].errors.contains_key(&CandidateField::Email));
        assert_eq!(records[1].errors.keys().collect::<Vec<_>>(), vec![&CandidateField::Role]);
        assert_eq!(records[2].errors.keys().collect::<Vec<_>>(), vec![&CandidateField::Event]);
    }

    #[test]
    fn duplicates_within_the_batch_flag_later_rows() {
        let conn = fixtures::open_in_memory();
        let mut records = vec![
            candidate("Jane", "Doe", Some("jane"), Some("jane@x.org")),
            candidate("Jane", "Doe", Some("jane"), Some("Jane@X.org")),
        ];
        verify_candidates(&conn, &rules(), &mut records).unwrap();

        assert!(records[0].errors.is_empty());
        assert_eq!(
            records[1].errors.get(&CandidateField::Username).map(String::as_str),
            Some("Username is already used by row 1 of this upload.")
        );
        assert!(records[1].errors.contains_key(&CandidateField::Email));
    }

    #[test]
    fn verification_is_idempotent() {
        let conn = fixtures::open_in_memory();
        crate::db::persons::insert_person(&conn, "Harry", "Potter", Some("harry"), None).unwrap();
        let mut records = vec![
            candidate("Harry", "Potter", Some("harry"), None),
            candidate("", "Doe", Some("-bad--name-"), Some("nope")),
            candidate("Jane", "Doe", Some("jane-doe"), Some("jane@x.org")),
        ];

        let first_any = verify_candidates(&conn, &rules(), &mut records).unwrap();
        let first: Vec<_> = records.iter().map(|r| r.errors.clone()).collect();
        let second_any = verify_candidates(&conn, &rules(), &mut records).unwrap();
        let second: Vec<_> = records.iter().map(|r| r.errors.clone()).collect();

        assert_eq!(first_any, second_any);
        assert_eq!(first, second);
        assert!(records[2].errors.is_empty());
        assert_eq!(fixtures::count(&conn, "persons"), 1);
    }
}
