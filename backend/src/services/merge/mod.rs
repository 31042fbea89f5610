//! Merging duplicate person records.
//!
//! A merge is proposed with two person ids, previewed, and then either
//! confirmed (which applies it) or rejected. Nothing is locked between the
//! steps: distinctness and existence are checked again on confirmation.
//!
//! The provided routes are:
//! - `POST /api/persons/merge`: proposes merging `source` into `target` and
//!   returns the pending request with its token.
//! - `GET /api/persons/merge/{token}`: the request and a reconciliation preview.
//! - `POST /api/persons/merge/{token}/confirm`: confirms and applies the merge.
//! - `DELETE /api/persons/merge/{token}`: rejects the request.

mod confirm;
pub mod engine;
pub mod lifecycle;
mod propose;

use actix_web::web::{delete, get, post, resource, scope};
use actix_web::Scope;

const API_PATH: &str = "/api/persons/merge";

/// Configures and returns the Actix `Scope` for all merge-related routes.
pub fn configure_routes() -> Scope {
    scope(API_PATH)
        .route("", post().to(propose::process))
        .service(
            resource("/{token}")
                .route(get().to(confirm::preview))
                .route(delete().to(confirm::reject)),
        )
        .route("/{token}/confirm", post().to(confirm::apply))
}
