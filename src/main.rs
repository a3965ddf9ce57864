use anyhow::{Context, Result};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use tracing_subscriber::EnvFilter;

use studymate::api;
use studymate::config::Config;
use studymate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;

    // Seed in the background so a slow embedding API doesn't block startup
    let seed_state = state.clone();
    tokio::spawn(async move {
        if let Err(e) = seed_state.seed_vector_store().await {
            tracing::warn!("Vector store seeding failed: {e:#}");
        }
    });

    let app = Router::new()
        .route("/", get(serve_index))
        .merge(api::router(state));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {bind_addr}"))?;
    tracing::info!("Listening on http://{bind_addr}");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

async fn serve_index() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}
