//! SQLite record store: connection handling and schema.
//!
//! Relations to `persons` deliberately have no `ON DELETE CASCADE`, so deleting
//! a person that is still referenced fails instead of silently dropping rows.

pub mod persons;

use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS persons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    personal TEXT NOT NULL,
    family TEXT NOT NULL,
    username TEXT UNIQUE,
    email TEXT COLLATE NOCASE UNIQUE
);
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    slug TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS tasks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id INTEGER NOT NULL REFERENCES events(id),
    person_id INTEGER NOT NULL REFERENCES persons(id),
    role_id INTEGER NOT NULL REFERENCES roles(id),
    UNIQUE (event_id, person_id, role_id)
);
CREATE TABLE IF NOT EXISTS badges (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS awards (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES persons(id),
    badge_id INTEGER NOT NULL REFERENCES badges(id),
    awarded TEXT NOT NULL DEFAULT (date('now')),
    UNIQUE (person_id, badge_id)
);
CREATE TABLE IF NOT EXISTS lessons (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS qualifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    person_id INTEGER NOT NULL REFERENCES persons(id),
    lesson_id INTEGER NOT NULL REFERENCES lessons(id),
    UNIQUE (person_id, lesson_id)
);
CREATE TABLE IF NOT EXISTS knowledge_domains (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS person_domains (
    person_id INTEGER NOT NULL REFERENCES persons(id),
    domain_id INTEGER NOT NULL REFERENCES knowledge_domains(id),
    PRIMARY KEY (person_id, domain_id)
);
";

/// Roles every installation starts with.
const STANDARD_ROLES: [&str; 6] = [
    "instructor",
    "helper",
    "learner",
    "host",
    "organizer",
    "contributor",
];

/// Handle to the record store file. Each operation opens its own connection.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Database { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn open(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        configure(&conn)?;
        Ok(conn)
    }

    /// Creates missing tables and seeds the standard roles.
    pub fn initialize(&self) -> rusqlite::Result<()> {
        let conn = self.open()?;
        apply_schema(&conn)
    }
}

fn configure(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_secs(5))
}

pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    for role in STANDARD_ROLES {
        conn.execute(
            "INSERT OR IGNORE INTO roles (name) VALUES (?1)",
            params![role],
        )?;
    }
    Ok(())
}
