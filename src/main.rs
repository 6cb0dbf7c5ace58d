//! OpenSASE Storefront - storefront and back-office API server

use anyhow::{Context, Result};
use opensase_storefront::{api, config::AppConfig, db, services, state::AppState};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let port = config.port;

    let pool = db::connect(&config).await.context("failed to connect to PostgreSQL")?;
    db::migrate(&pool).await.context("failed to run migrations")?;

    let state = AppState::build(config, pool).await?;
    services::users::bootstrap_admin(&state).await.context("failed to create bootstrap admin")?;

    let app = api::router(state);
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!("🚀 OpenSASE Storefront listening on 0.0.0.0:{}", port);
    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
