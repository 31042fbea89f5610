//! Shared fixtures for handler tests: a temporary record store and an app
//! wired the same way as `main.rs`.

use crate::config::Config;
use crate::db::Database;
use crate::pending_controller::state::PendingState;
use crate::services;
use crate::services::bulk_add::validate::ValidationRules;
use actix_web::dev::{ServiceFactory, ServiceRequest, ServiceResponse};
use actix_web::{web, App};
use clap::Parser;
use rusqlite::Connection;
use tempfile::TempDir;

pub struct TestContext {
    _dir: TempDir,
    pub config: Config,
    pub database: Database,
    pub pending: PendingState,
}

impl TestContext {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roster.sqlite");
        let config = Config::parse_from([
            "roster-server",
            "--database",
            path.to_str().unwrap(),
            "--max-upload-bytes",
            "4096",
        ]);
        let database = Database::new(&config.database);
        database.initialize().unwrap();
        let pending = PendingState::new(config.pending_ttl());
        TestContext {
            _dir: dir,
            config,
            database,
            pending,
        }
    }

    pub fn conn(&self) -> Connection {
        self.database.open().unwrap()
    }

    pub fn app(
        &self,
    ) -> App<
        impl ServiceFactory<
            ServiceRequest,
            Config = (),
            Response = ServiceResponse,
            Error = actix_web::Error,
            InitError = (),
        >,
    > {
        App::new()
            .app_data(web::Data::new(self.pending.clone()))
            .app_data(web::Data::new(self.database.clone()))
            .app_data(web::Data::new(ValidationRules::new().unwrap()))
            .app_data(web::Data::new(self.config.clone()))
            .configure(services::configure)
    }
}

/// Builds a `multipart/form-data` body with a CSV file part and an optional
/// charset part. Returns the content type header value and the body.
pub fn multipart_csv(filename: &str, csv: &[u8], charset: Option<&str>) -> (String, Vec<u8>) {
    let boundary = "roster-test-boundary";
    let mut body = Vec::new();
    if let Some(charset) = charset {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"charset\"\r\n\r\n{}\r\n",
                boundary, charset
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\nContent-Type: text/csv\r\n\r\n",
            boundary, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(csv);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    (format!("multipart/form-data; boundary={}", boundary), body)
}
