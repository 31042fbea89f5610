//! Folds one person into another.
//!
//! Awards, tasks, qualifications and knowledge-domain links of `source` are
//! moved to `target`, then `source` is deleted, all inside one transaction.
//! Qualifications and domain links that `target` already holds are dropped
//! from `source` instead of moved. A source award for a badge the target
//! already holds, or a source task the target already holds, blocks the merge.

use crate::db::persons;
use crate::error::MergeError;
use common::model::merge::{MergeConflict, MergeOutcome, MergePreview};
use common::model::person::{Person, PersonId};
use log::info;
use rusqlite::{params, Connection, Params};

const AWARD_CONSTRAINT: &str = "award(person, badge)";
const TASK_CONSTRAINT: &str = "task(event, person, role)";

/// What a merge would do, computed from the current store contents.
struct MergePlan {
    awards_moved: usize,
    tasks_moved: usize,
    qualifications_moved: usize,
    qualifications_dropped: usize,
    domains_moved: usize,
    domains_dropped: usize,
    conflicts: Vec<MergeConflict>,
}

fn count<P: Params>(conn: &Connection, sql: &str, params: P) -> rusqlite::Result<usize> {
    let n: i64 = conn.query_row(sql, params, |row| row.get(0))?;
    Ok(n as usize)
}

/// Loads both persons, refusing self-merges and unknown ids.
fn load_pair(conn: &Connection, source: PersonId, target: PersonId) -> Result<(Person, Person), MergeError> {
    if source == target {
        return Err(MergeError::SelfMerge);
    }
    let source_person = persons::find_person(conn, source)?.ok_or(MergeError::NotFound(source))?;
    let target_person = persons::find_person(conn, target)?.ok_or(MergeError::NotFound(target))?;
    Ok((source_person, target_person))
}

fn find_conflicts(conn: &Connection, source: PersonId, target: PersonId) -> rusqlite::Result<Vec<MergeConflict>> {
    let mut conflicts = Vec::new();

    let mut stmt = conn.prepare(
        "SELECT b.name FROM awards a JOIN badges b ON b.id = a.badge_id
         WHERE a.person_id = ?1
           AND a.badge_id IN (SELECT badge_id FROM awards WHERE person_id = ?2)
         ORDER BY b.name",
    )?;
    let badges = stmt.query_map(params![source, target], |row| row.get::<_, String>(0))?;
    for badge in badges {
        conflicts.push(MergeConflict {
            constraint: AWARD_CONSTRAINT.to_string(),
            detail: format!("both persons hold the {} badge", badge?),
        });
    }

    let mut stmt = conn.prepare(
        "SELECT e.slug, r.name FROM tasks t
         JOIN events e ON e.id = t.event_id
         JOIN roles r ON r.id = t.role_id
         WHERE t.person_id = ?1
           AND EXISTS (SELECT 1 FROM tasks o
                       WHERE o.person_id = ?2 AND o.event_id = t.event_id AND o.role_id = t.role_id)
         ORDER BY e.slug, r.name",
    )?;
    let tasks = stmt.query_map(params![source, target], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    for task in tasks {
        let (slug, role) = task?;
        conflicts.push(MergeConflict {
            constraint: TASK_CONSTRAINT.to_string(),
            detail: format!("both persons are {} at {}", role, slug),
        });
    }

    Ok(conflicts)
}

fn plan_merge(conn: &Connection, source: PersonId, target: PersonId) -> rusqlite::Result<MergePlan> {
    let conflicts = find_conflicts(conn, source, target)?;
    let award_conflicts = conflicts.iter().filter(|c| c.constraint == AWARD_CONSTRAINT).count();
    let task_conflicts = conflicts.len() - award_conflicts;

    let awards = count(conn, "SELECT COUNT(*) FROM awards WHERE person_id = ?1", params![source])?;
    let tasks = count(conn, "SELECT COUNT(*) FROM tasks WHERE person_id = ?1", params![source])?;
    let qualifications = count(
        conn,
        "SELECT COUNT(*) FROM qualifications WHERE person_id = ?1",
        params![source],
    )?;
    let qualifications_dropped = count(
        conn,
        "SELECT COUNT(*) FROM qualifications WHERE person_id = ?1
           AND lesson_id IN (SELECT lesson_id FROM qualifications WHERE person_id = ?2)",
        params![source, target],
    )?;
    let domains = count(
        conn,
        "SELECT COUNT(*) FROM person_domains WHERE person_id = ?1",
        params![source],
    )?;
    let domains_dropped = count(
        conn,
        "SELECT COUNT(*) FROM person_domains WHERE person_id = ?1
           AND domain_id IN (SELECT domain_id FROM person_domains WHERE person_id = ?2)",
        params![source, target],
    )?;

    Ok(MergePlan {
        awards_moved: awards - award_conflicts,
        tasks_moved: tasks - task_conflicts,
        qualifications_moved: qualifications - qualifications_dropped,
        qualifications_dropped,
        domains_moved: domains - domains_dropped,
        domains_dropped,
        conflicts,
    })
}

/// Describes the merge of `source` into `target` without changing anything.
pub fn preview_merge(conn: &Connection, source: PersonId, target: PersonId) -> Result<MergePreview, MergeError> {
    let (source_person, target_person) = load_pair(conn, source, target)?;
    let plan = plan_merge(conn, source, target)?;
    Ok(MergePreview {
        source: source_person,
        target: target_person,
        awards_moved: plan.awards_moved,
        tasks_moved: plan.tasks_moved,
        qualifications_moved: plan.qualifications_moved,
        qualifications_dropped: plan.qualifications_dropped,
        domains_moved: plan.domains_moved,
        domains_dropped: plan.domains_dropped,
        conflicts: plan.conflicts,
    })
}

/// Merges `source` into `target` and deletes `source`.
///
/// Either every change is applied or, on any error, none is.
pub fn merge_persons(conn: &mut Connection, source: PersonId, target: PersonId) -> Result<MergeOutcome, MergeError> {
    let tx = conn.transaction()?;

    let (source_person, target_person) = load_pair(&tx, source, target)?;
    let plan = plan_merge(&tx, source, target)?;
    if !plan.conflicts.is_empty() {
        return Err(MergeError::Conflict(plan.conflicts));
    }

    let qualifications_dropped = tx.execute(
        "DELETE FROM qualifications WHERE person_id = ?1
           AND lesson_id IN (SELECT lesson_id FROM qualifications WHERE person_id = ?2)",
        params![source, target],
    )?;
    let qualifications_moved = tx.execute(
        "UPDATE qualifications SET person_id = ?2 WHERE person_id = ?1",
        params![source, target],
    )?;

    let domains_dropped = tx.execute(
        "DELETE FROM person_domains WHERE person_id = ?1
           AND domain_id IN (SELECT domain_id FROM person_domains WHERE person_id = ?2)",
        params![source, target],
    )?;
    let domains_moved = tx.execute(
        "UPDATE person_domains SET person_id = ?2 WHERE person_id = ?1",
        params![source, target],
    )?;

    let awards_moved = tx.execute(
        "UPDATE awards SET person_id = ?2 WHERE person_id = ?1",
        params![source, target],
    )?;
    let tasks_moved = tx.execute(
        "UPDATE tasks SET person_id = ?2 WHERE person_id = ?1",
        params![source, target],
    )?;

    tx.execute("DELETE FROM persons WHERE id = ?1", params![source])?;
    tx.commit()?;

    info!(
        "Merged {} ({}) into {} ({})",
        source_person.full_name(),
        source,
        target_person.full_name(),
        target
    );

    Ok(MergeOutcome {
        awards_moved,
        tasks_moved,
        qualifications_moved,
        qualifications_dropped,
        domains_moved,
        domains_dropped,
    })
}
