//! Persists validated candidates.
//!
//! Each record is its own transaction: the person and its optional task are
//! committed together or not at all. A record that fails on a unique
//! constraint or a vanished event/role is reported and skipped; the batch
//! carries on. Any other store error stops the batch, leaving earlier records
//! committed.

use crate::db::persons;
use crate::error::{CommitAborted, CommitError};
use common::model::bulk::{CommitPreview, CommitReport, FailureKind, RecordFailure};
use common::model::candidate::CandidateRecord;
use log::{error, info, warn};
use rusqlite::Connection;

/// Outcome of a single committed record.
struct Committed {
    task_created: bool,
}

/// Counts what `commit_candidates` would create for these records.
pub fn preview_commit(records: &[CandidateRecord]) -> CommitPreview {
    let mut preview = CommitPreview {
        persons_to_create: 0,
        tasks_to_create: 0,
        blocked: Vec::new(),
    };
    for (index, record) in records.iter().enumerate() {
        if record.has_errors() {
            preview.blocked.push(index);
        } else {
            preview.persons_to_create += 1;
            if record.wants_task() {
                preview.tasks_to_create += 1;
            }
        }
    }
    preview
}

fn describe_errors(record: &CandidateRecord) -> String {
    record
        .errors
        .iter()
        .map(|(field, msg)| format!("{}: {}", field.column(), msg))
        .collect::<Vec<_>>()
        .join("; ")
}

fn commit_one(conn: &mut Connection, record: &CandidateRecord) -> Result<Committed, CommitError> {
    let tx = conn.transaction()?;

    let person_id = persons::insert_person(
        &tx,
        record.personal.trim(),
        record.family.trim(),
        record.username.as_deref(),
        record.email.as_deref(),
    )?;

    let mut task_created = false;
    if let (Some(slug), Some(role)) = (record.event.as_deref(), record.role.as_deref()) {
        let event_id = persons::event_id_by_slug(&tx, slug)?
            .ok_or_else(|| CommitError::ReferenceNotFound(format!("event {}", slug)))?;
        let role_id = persons::role_id_by_name(&tx, role)?
            .ok_or_else(|| CommitError::ReferenceNotFound(format!("role {}", role)))?;
        persons::insert_task(&tx, event_id, person_id, role_id)?;
        task_created = true;
    }

    tx.commit()?;
    Ok(Committed { task_created })
}

/// Commits every record without errors; records with errors are refused.
///
/// The returned report lists the committed indices so the caller can drop
/// them from the pending batch.
pub fn commit_candidates(
    conn: &mut Connection,
    records: &[CandidateRecord],
) -> Result<CommitReport, CommitAborted> {
    let mut report = CommitReport::default();

    for (index, record) in records.iter().enumerate() {
        if record.has_errors() {
            report.failures.push(RecordFailure {
                index,
                kind: FailureKind::Invalid,
                reason: describe_errors(record),
            });
            continue;
        }

        match commit_one(conn, record) {
            Ok(committed) => {
                report.persons_created += 1;
                if committed.task_created {
                    report.tasks_created += 1;
                }
                report.committed.push(index);
            }
            Err(CommitError::IntegrityViolation(reason)) => {
                warn!("Record {} rejected by the store: {}", index + 1, reason);
                report.failures.push(RecordFailure {
                    index,
                    kind: FailureKind::IntegrityViolation,
                    reason,
                });
            }
            Err(CommitError::ReferenceNotFound(reason)) => {
                warn!("Record {} references a missing {}", index + 1, reason);
                report.failures.push(RecordFailure {
                    index,
                    kind: FailureKind::ReferenceNotFound,
                    reason: format!("{} no longer exists", reason),
                });
            }
            Err(CommitError::Store(source)) => {
                error!("Bulk commit stopped at record {}: {}", index + 1, source);
                return Err(CommitAborted { report, source });
            }
        }
    }

    info!(
        "Successfully created {} persons and {} tasks ({} records refused)",
        report.persons_created,
        report.tasks_created,
        report.failures.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;
    use crate::services::bulk_add::parse::parse_candidates;
    use crate::services::bulk_add::validate::{verify_candidates, ValidationRules};
    use common::model::candidate::CandidateField;

    fn candidate(personal: &str, username: &str) -> CandidateRecord {
        CandidateRecord {
            personal: personal.to_string(),
            family: "Doe".to_string(),
            username: Some(username.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn single_clean_row_creates_one_person_and_no_task() {
        let mut conn = fixtures::open_in_memory();
        let mut records = parse_candidates(
            "personal,family,username,email,event,role\nJane,Doe,jane-doe,jane@x.org,,\n",
        )
        .unwrap();
        assert_eq!(records.len(), 1);

        let any = verify_candidates(&conn, &ValidationRules::new().unwrap(), &mut records).unwrap();
        assert!(!any);

        let report = commit_candidates(&mut conn, &records).unwrap();
        assert_eq!(report.persons_created, 1);
        assert_eq!(report.tasks_created, 0);
        assert!(report.failures.is_empty());
        assert_eq!(fixtures::count(&conn, "persons"), 1);
        assert_eq!(fixtures::count(&conn, "tasks"), 0);
    }

    #[test]
    fn bad_username_is_refused_while_siblings_commit() {
        let mut conn = fixtures::open_in_memory();
        let mut records = parse_candidates(
            "personal,family,username,email\n\
             Jane,Doe,jane-doe,jane@x.org\n\
             Bad,Name,-bad--name-,bad@x.org\n\
             John,Smith,john,john@x.org\n",
        )
        .unwrap();
        verify_candidates(&conn, &ValidationRules::new().unwrap(), &mut records).unwrap();
        assert!(records[1].errors.contains_key(&CandidateField::Username));

        let report = commit_candidates(&mut conn, &records).unwrap();
        assert_eq!(report.persons_created, 2);
        assert_eq!(report.committed, vec![0, 2]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].kind, FailureKind::Invalid);
        assert_eq!(fixtures::count(&conn, "persons"), 2);
    }

    #[test]
    fn person_and_task_commit_together() {
        let mut conn = fixtures::open_in_memory();
        fixtures::event(&conn, "2016-01-01-hogwarts");
        let mut record = candidate("Jane", "jane");
        record.event = Some("2016-01-01-hogwarts".to_string());
        record.role = Some("instructor".to_string());

        let report = commit_candidates(&mut conn, &[record]).unwrap();
        assert_eq!((report.persons_created, report.tasks_created), (1, 1));
        assert_eq!(fixtures::count(&conn, "tasks"), 1);
    }

    #[test]
    fn vanished_event_rolls_back_the_person() {
        let mut conn = fixtures::open_in_memory();
        let mut record = candidate("Jane", "jane");
        record.event = Some("deleted-event".to_string());
        record.role = Some("instructor".to_string());

        let report = commit_candidates(&mut conn, &[record, candidate("John", "john")]).unwrap();
        assert_eq!(report.persons_created, 1);
        assert_eq!(report.failures[0].kind, FailureKind::ReferenceNotFound);
        assert_eq!(fixtures::count(&conn, "persons"), 1);
    }

    #[test]
    fn uniqueness_race_is_reported_per_record() {
        let mut conn = fixtures::open_in_memory();
        let records = vec![candidate("Jane", "jane"), candidate("Jane", "jane"), candidate("John", "john")];

        // validated separately, so the duplicate is only caught by the store
        let report = commit_candidates(&mut conn, &records).unwrap();
        assert_eq!(report.persons_created, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].kind, FailureKind::IntegrityViolation);
    }

    #[test]
    fn fatal_store_error_keeps_earlier_records() {
        let mut conn = fixtures::open_in_memory();
        fixtures::event(&conn, "2016-01-01-hogwarts");
        let mut second = candidate("John", "john");
        second.event = Some("2016-01-01-hogwarts".to_string());
        second.role = Some("helper".to_string());
        // a store failure that is not a constraint violation
        conn.execute_batch("DROP TABLE tasks;").unwrap();

        let err = commit_candidates(&mut conn, &[candidate("Jane", "jane"), second]).unwrap_err();
        assert_eq!(err.report.committed, vec![0]);
        assert_eq!(fixtures::count(&conn, "persons"), 1);
    }

    #[test]
    fn preview_counts_committable_records() {
        let mut blocked = candidate("Bad", "-bad-");
        blocked.errors.insert(CandidateField::Username, "bad".to_string());
        let mut with_task = candidate("Jane", "jane");
        with_task.event = Some("e".to_string());
        with_task.role = Some("helper".to_string());

        let preview = preview_commit(&[with_task, blocked, candidate("John", "john")]);
        assert_eq!(preview.persons_to_create, 2);
        assert_eq!(preview.tasks_to_create, 1);
        assert_eq!(preview.blocked, vec![1]);
    }
}
