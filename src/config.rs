use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::Duration;

const DEV_JWT_SECRET: &str = "taskboard-dev-secret";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: PathBuf,
    pub listen_addr: SocketAddr,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub reset_token_ttl: Duration,
    /// Base URL used to build password reset links.
    pub public_url: String,
    /// Signing up with this address creates an admin.
    pub admin_email: Option<String>,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let listen_addr = lookup("TASKBOARD_LISTEN")
            .unwrap_or_else(|| "0.0.0.0:5876".to_string())
            .parse()
            .context("TASKBOARD_LISTEN is not a socket address")?;

        let session_hours: i64 = lookup("TASKBOARD_SESSION_TTL_HOURS")
            .map(|v| v.parse())
            .transpose()
            .context("TASKBOARD_SESSION_TTL_HOURS is not a number")?
            .unwrap_or(24 * 7);

        let reset_minutes: i64 = lookup("TASKBOARD_RESET_TTL_MINUTES")
            .map(|v| v.parse())
            .transpose()
            .context("TASKBOARD_RESET_TTL_MINUTES is not a number")?
            .unwrap_or(5);

        let log_format = match lookup("TASKBOARD_LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => anyhow::bail!("TASKBOARD_LOG_FORMAT must be text or json, got {other}"),
        };

        Ok(Config {
            database_path: lookup("TASKBOARD_DATABASE")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("taskboard.db")),
            listen_addr,
            jwt_secret: lookup("TASKBOARD_JWT_SECRET").unwrap_or_else(|| DEV_JWT_SECRET.to_string()),
            session_ttl: Duration::hours(session_hours),
            reset_token_ttl: Duration::minutes(reset_minutes),
            public_url: lookup("TASKBOARD_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:5876".to_string())
                .trim_end_matches('/')
                .to_string(),
            admin_email: lookup("TASKBOARD_ADMIN_EMAIL").map(|e| e.trim().to_lowercase()),
            log_format,
        })
    }

    /// Settings for a throwaway instance backed by `database_path`.
    pub fn for_database(database_path: impl Into<PathBuf>) -> Self {
        Config {
            database_path: database_path.into(),
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            session_ttl: Duration::hours(24 * 7),
            reset_token_ttl: Duration::minutes(5),
            public_url: "http://localhost:5876".to_string(),
            admin_email: None,
            log_format: LogFormat::Text,
        }
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}
