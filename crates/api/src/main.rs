use anyhow::Context;

use compass_api::config::ApiConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    compass_observability::init();

    let config = ApiConfig::from_env();
    let app = compass_api::app::build_app(&config);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %listener.local_addr()?,
        currency_scale = config.currency_scale,
        "listening"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
