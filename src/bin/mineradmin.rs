use anyhow::{Context, Result};
use clap::Parser;
use mineradmin::config::{self, Config};
use mineradmin::store::{PgStore, Store};
use mineradmin::web::{self, AppState};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();
    config::init_tracing(&config.log_level)?;

    let store = PgStore::connect(&config.postgres_url)
        .await
        .context("Failed to connect to PostgreSQL")?;
    if config.migrate {
        store.migrate().await.context("Failed to apply migrations")?;
    }

    let store: Arc<dyn Store> = Arc::new(store);
    let state = AppState::from_config(&config, store);
    let app = web::router(state);

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen))?;
    info!("MinerAdmin listening on {} ({:?} mode)", config.listen, config.run_mode);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
