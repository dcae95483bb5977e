use std::sync::Arc;

use tokio::net::TcpListener;

use prompt_variation_service::{AppConfig, ModelRegistry, build_router, logging::init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("info,hyper=warn,axum::rejection=trace");

    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!(
        ?config.listen_addr,
        backend = config.backend.as_str(),
        "loading generation backend"
    );

    let registry = Arc::new(ModelRegistry::initialize(config.as_ref())?);
    let router = build_router(config.clone(), registry);

    let listener = TcpListener::bind(config.listen_addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "REST server ready");

    axum::serve(listener, router).await?;

    Ok(())
}
