//! IRM Server - Main entry point

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use irm_common::logging::{init_logging, LogConfig};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use irm_server::{api, config::Config, domain};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("irm-server".to_string())
        .filter_directives("irm_server=debug,tower_http=debug,axum=trace,sqlx=info".to_string())
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting IRM Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    let registry = Arc::new(domain::build_registry()?);
    info!("Entity registry built with {} descriptors", registry.len());

    let state = api::AppState {
        db: db_pool,
        registry,
    };

    api::serve(config, state).await?;

    info!("Server shut down gracefully");

    Ok(())
}
