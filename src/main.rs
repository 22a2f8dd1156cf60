use std::net::SocketAddr;

use anyhow::Context;

use mpesa_express::build_router;
use mpesa_express::config::{AppConfig, Deployment};
use mpesa_express::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let deployment = Deployment::current();
    let config = AppConfig::from_env(deployment).context("Failed to load M-Pesa configuration")?;

    tracing::info!("App config loaded: {}", config.get_config_info());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let app_state = AppState::new(config)?;
    let app = build_router(app_state);

    tracing::info!("🚀 Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}
