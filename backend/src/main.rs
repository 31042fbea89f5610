mod config;
mod db;
mod error;
mod pending_controller;
mod services;
#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::db::Database;
use crate::pending_controller::state::PendingState;
use crate::services::bulk_add::validate::ValidationRules;
use actix_web::{web, App, HttpServer};
use clap::Parser;
use env_logger::Env;
use log::info;
use std::io;

#[actix_web::main]
async fn main() -> io::Result<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    let config = Config::parse();

    let database = Database::new(&config.database);
    database.initialize().map_err(io::Error::other)?;
    info!("Record store ready at {}", database.path().display());

    let rules = ValidationRules::new().map_err(io::Error::other)?;

    // Uploads and merge requests awaiting the operator
    let pending = PendingState::new(config.pending_ttl());

    // Start the expiry sweeper
    let sweeper_state = pending.clone();
    let sweep_interval = config.sweep_interval();
    tokio::spawn(async move {
        pending_controller::state::start_pending_sweeper(sweeper_state, sweep_interval).await;
    });

    let bind = (config.host.clone(), config.port);
    info!("Server running at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        App::new()
            .app_data(web::JsonConfig::default().limit(config.max_upload_bytes))
            .app_data(web::Data::new(pending.clone()))
            .app_data(web::Data::new(database.clone()))
            .app_data(web::Data::new(rules.clone()))
            .app_data(web::Data::new(config.clone()))
            .configure(services::configure)
    })
    .bind(bind)?
    .run()
    .await
}
