//! Server configuration from flags and environment

use clap::Parser;
use std::net::SocketAddr;

pub const DEFAULT_MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "manualdesk",
    about = "Operations manuals server with per-business access control and work sessions"
)]
pub struct Config {
    /// SQLite connection string
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:manualdesk.db?mode=rwc")]
    pub database_url: String,

    /// Address to listen on
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
    pub bind: SocketAddr,

    /// Maximum pooled database connections
    #[arg(long, env = "DATABASE_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    /// Largest accepted photo upload, in bytes
    #[arg(long, env = "MAX_PHOTO_BYTES", default_value_t = DEFAULT_MAX_PHOTO_BYTES)]
    pub max_photo_bytes: usize,

    /// Email of a superadmin to create at startup if no such user exists
    #[arg(long, env = "BOOTSTRAP_SUPERADMIN")]
    pub bootstrap_superadmin: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_flags() {
        let config = Config::try_parse_from([
            "manualdesk",
            "--database-url",
            "sqlite::memory:",
            "--bind",
            "127.0.0.1:8080",
            "--max-connections",
            "2",
            "--max-photo-bytes",
            "1024",
            "--bootstrap-superadmin",
            "root@example.com",
        ])
        .unwrap();

        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bind, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.max_connections, 2);
        assert_eq!(config.max_photo_bytes, 1024);
        assert_eq!(
            config.bootstrap_superadmin.as_deref(),
            Some("root@example.com")
        );
    }

    #[test]
    fn test_rejects_bad_bind_address() {
        let result = Config::try_parse_from(["manualdesk", "--bind", "not-an-address"]);
        assert!(result.is_err());
    }
}
