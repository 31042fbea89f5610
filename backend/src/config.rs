//! Runtime configuration for the roster service.
//!
//! Every option can be given on the command line or through the matching
//! `ROSTER_*` environment variable.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(name = "roster-server", about = "Bulk person upload and person merge service")]
pub struct Config {
    /// Address the HTTP server binds to.
    #[arg(long, env = "ROSTER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the HTTP server listens on.
    #[arg(long, env = "ROSTER_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the SQLite record store.
    #[arg(long, env = "ROSTER_DATABASE", default_value = "roster.sqlite")]
    pub database: PathBuf,

    /// Seconds a pending upload or merge request may sit idle before it expires.
    #[arg(long, env = "ROSTER_PENDING_TTL_SECS", default_value_t = 3600)]
    pub pending_ttl_secs: u64,

    /// Seconds between sweeps of expired pending operations.
    #[arg(long, env = "ROSTER_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Largest accepted CSV upload, in bytes.
    #[arg(long, env = "ROSTER_MAX_UPLOAD_BYTES", default_value_t = 5 * 1024 * 1024)]
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // tokio intervals panic on a zero period
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_without_arguments() {
        let config = Config::parse_from(["roster-server"]);
        assert_eq!(config.port, 8080);
        assert_eq!(config.database, PathBuf::from("roster.sqlite"));
        assert_eq!(config.pending_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn zero_sweep_interval_is_clamped() {
        let config = Config::parse_from(["roster-server", "--sweep-interval-secs", "0"]);
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
