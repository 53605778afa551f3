use std::sync::Arc;

use anyhow::{Context, Result};

use taskboard::config::Config;
use taskboard::mailer::LogMailer;
use taskboard::{build_router, telemetry, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    telemetry::init_tracing(config.log_format)?;

    if config.uses_dev_secret() {
        tracing::warn!("TASKBOARD_JWT_SECRET is not set; using the development secret");
    }

    // Schema is created before the first request is served.
    let state = AppState::new(config, Arc::new(LogMailer));
    state.db().context("initializing database")?;

    let addr = state.config.listen_addr;
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, database = %state.config.database_path.display(), "taskboard listening");

    axum::serve(listener, app).await?;

    Ok(())
}
