//! Bulk upload of people from a CSV file.
//!
//! An upload is parsed and validated straight away and then parked in the
//! pending store under an operation token. The operator reviews it, edits rows
//! and re-validates as often as needed, previews the commit and finally
//! confirms or cancels it.
//!
//! The provided routes are:
//! - `GET /api/persons/bulk_add/template`: CSV file containing only the
//!   expected header row.
//! - `POST /api/persons/bulk_add/upload`: multipart upload with a `file` field
//!   (`.csv`) and an optional `charset` field. Returns the validated batch and
//!   its token. Uploading a file identical to a still-pending one returns that
//!   batch instead of creating a second one.
//! - `GET /api/persons/bulk_add/{token}`: re-validates and returns the batch.
//! - `PUT /api/persons/bulk_add/{token}`: replaces the batch rows with the
//!   operator's edits and re-validates them.
//! - `GET /api/persons/bulk_add/{token}/preview`: what confirming would create.
//! - `POST /api/persons/bulk_add/{token}/confirm`: re-validates, then commits
//!   every record without errors. Records left uncommitted stay pending.
//! - `DELETE /api/persons/bulk_add/{token}`: cancels the upload.

use actix_web::web::{delete, get, post, put, resource, scope};
use actix_web::Scope;

pub mod committer;
mod confirm;
pub mod parse;
mod review;
mod template;
mod upload;
pub mod validate;

const API_PATH: &str = "/api/persons/bulk_add";

/// Configures and returns the Actix scope for bulk upload routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        // Registered before `/{token}` so the literal path wins.
        .route("/template", get().to(template::process))
        .route("/upload", post().to(upload::process))
        .service(
            resource("/{token}")
                .route(get().to(review::show))
                .route(put().to(review::update))
                .route(delete().to(confirm::cancel)),
        )
        .route("/{token}/preview", get().to(confirm::preview))
        .route("/{token}/confirm", post().to(confirm::commit))
}
