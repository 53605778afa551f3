use std::sync::Arc;

pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod due;
pub mod error;
pub mod extract;
pub mod mailer;
pub mod models;
pub mod pages;
pub mod password;
pub mod router;
pub mod session;
pub mod telemetry;

use config::Config;
use db::Database;
use mailer::Mailer;
use session::SessionKeys;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub sessions: SessionKeys,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: Config, mailer: Arc<dyn Mailer>) -> Self {
        let sessions = SessionKeys::new(&config.jwt_secret, config.session_ttl);
        Self {
            config: Arc::new(config),
            sessions,
            mailer,
        }
    }

    /// Opens a connection for the current request.
    pub fn db(&self) -> anyhow::Result<Database> {
        Database::connect(&self.config.database_path)
    }
}

pub use router::build_router;
