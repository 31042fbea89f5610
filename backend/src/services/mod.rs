pub mod bulk_add;
pub mod merge;

use actix_web::web;

/// Registers every service scope on an application.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(bulk_add::configure_routes())
        .service(merge::configure_routes());
}
