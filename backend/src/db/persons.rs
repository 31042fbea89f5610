//! Person, event and role queries shared by the bulk upload and merge services.
//!
//! Every function takes a plain `&Connection` so it can run either directly or
//! inside a `Transaction`.

use common::model::person::{Person, PersonId};
use rusqlite::{params, Connection, OptionalExtension};

pub fn find_person(conn: &Connection, id: PersonId) -> rusqlite::Result<Option<Person>> {
    conn.query_row(
        "SELECT id, personal, family, username, email FROM persons WHERE id = ?1",
        params![id],
        |row| {
            Ok(Person {
                id: row.get(0)?,
                personal: row.get(1)?,
                family: row.get(2)?,
                username: row.get(3)?,
                email: row.get(4)?,
            })
        },
    )
    .optional()
}

pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM persons WHERE username = ?1)",
        params![username],
        |row| row.get(0),
    )
}

/// Emails compare case-insensitively through the column collation.
pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM persons WHERE email = ?1)",
        params![email],
        |row| row.get(0),
    )
}

pub fn event_id_by_slug(conn: &Connection, slug: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM events WHERE slug = ?1",
        params![slug],
        |row| row.get(0),
    )
    .optional()
}

pub fn role_id_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM roles WHERE name = ?1",
        params![name],
        |row| row.get(0),
    )
    .optional()
}

pub fn insert_person(
    conn: &Connection,
    personal: &str,
    family: &str,
    username: Option<&str>,
    email: Option<&str>,
) -> rusqlite::Result<PersonId> {
    conn.execute(
        "INSERT INTO persons (personal, family, username, email) VALUES (?1, ?2, ?3, ?4)",
        params![personal, family, username, email],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_task(
    conn: &Connection,
    event_id: i64,
    person_id: PersonId,
    role_id: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO tasks (event_id, person_id, role_id) VALUES (?1, ?2, ?3)",
        params![event_id, person_id, role_id],
    )?;
    Ok(conn.last_insert_rowid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::fixtures;

    #[test]
    fn email_lookup_ignores_case() {
        let conn = fixtures::open_in_memory();
        insert_person(&conn, "Harry", "Potter", None, Some("Harry@Hogwarts.edu")).unwrap();

        assert!(email_taken(&conn, "harry@hogwarts.edu").unwrap());
        assert!(!email_taken(&conn, "ron@hogwarts.edu").unwrap());
    }

    #[test]
    fn find_person_returns_none_for_unknown_id() {
        let conn = fixtures::open_in_memory();
        let id = insert_person(&conn, "Ron", "Weasley", Some("ron"), None).unwrap();

        let ron = find_person(&conn, id).unwrap().unwrap();
        assert_eq!(ron.full_name(), "Ron Weasley");
        assert_eq!(ron.username.as_deref(), Some("ron"));
        assert!(find_person(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn standard_roles_are_seeded() {
        let conn = fixtures::open_in_memory();
        assert!(role_id_by_name(&conn, "instructor").unwrap().is_some());
        assert!(role_id_by_name(&conn, "wizard").unwrap().is_none());
    }
}
