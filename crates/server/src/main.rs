mod migrations;

use adboard_core::{AppConfig, connect};
use ads::{AdsService, PgAdRepository};
use anyhow::Context;
use api::{AppState, router};
use auth::{AuthService, PgUserRepository, TokenService};
use std::{sync::Arc, time::Duration};
use storage::LocalObjectStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let (config, overrides) = AppConfig::load_with_env().context("failed to load configuration")?;
    if !overrides.is_empty() {
        tracing::info!(keys = ?overrides, "configuration overridden from environment");
    }

    let pool = connect(&config.database)
        .await
        .context("failed to connect to database")?;

    let applied = migrations::run_migrations(&pool)
        .await
        .context("failed to run migrations")?;
    tracing::info!(applied, "migrations up to date");

    let tokens = TokenService::new(
        &config.auth.jwt_secret,
        chrono::Duration::seconds(config.auth.token_expiry_seconds),
    );
    let auth_service = AuthService::new(
        Arc::new(PgUserRepository::new(pool.clone())),
        tokens,
        Duration::from_millis(config.auth.hash_timeout_ms),
    )
    .with_max_concurrent_hashes(config.auth.max_concurrent_hashes);

    let store = LocalObjectStore::new(&config.storage.root, &config.storage.bucket)
        .context("failed to open object storage")?;
    let ads_service = AdsService::new(
        Arc::new(PgAdRepository::new(pool.clone())),
        Arc::new(store),
        config.storage.max_image_bytes,
    );
    ads_service
        .init_bucket()
        .await
        .context("failed to create image bucket")?;

    let state = Arc::new(AppState::new(
        auth_service,
        ads_service,
        config.storage.max_body_bytes,
    ));
    let app = router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Gracefully shutdown");
}
