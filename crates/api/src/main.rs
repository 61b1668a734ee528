use std::sync::Arc;

use anyhow::Context;

use farmops_api::app::{AppServices, build_app};
use farmops_infra::{FarmopsConfig, SystemClock};
use farmops_observability::LogFormat;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = FarmopsConfig::load().context("failed to load configuration")?;
    farmops_observability::init_with(LogFormat::for_environment(&config.environment));

    let services = Arc::new(AppServices::new(&config, Arc::new(SystemClock)));
    let app = build_app(services);

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!(
        address = %listener.local_addr()?,
        environment = %config.environment,
        "listening"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
