use std::sync::Arc;

use axum::http::{HeaderValue, Method, header};
use movieflix_core::{Config, spawn_sweeper};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

mod error;
mod handlers;
mod models;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    tracing::info!(?config, "loaded configuration");

    let engine = movieflix_core::build_engine(&config).await?;
    let cancel = CancellationToken::new();
    let sweeper = spawn_sweeper(engine.cache().clone(), config.sweep_interval, cancel.clone());

    let state = Arc::new(AppState { engine });
    let app = handlers::router(state).layer(ServiceBuilder::new().layer(cors(&config.cors_origin)?));

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    println!("MovieFlix API running on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel.clone()))
        .await?;

    cancel.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!(error = %e, "sweeper task ended abnormally");
    }
    tracing::info!("shut down");
    Ok(())
}

fn cors(origin: &str) -> anyhow::Result<CorsLayer> {
    let origin: HeaderValue = origin.parse()?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]))
}

async fn shutdown_signal(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    tracing::info!("ctrl-c received, shutting down");
    cancel.cancel();
}
