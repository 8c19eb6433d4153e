use axum::routing::{get, patch, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use tariff_match::api;
use tariff_match::config::Config;
use tariff_match::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!(
        "Embedding provider: {} ({}, model {}, dim {})",
        config.embedding.provider,
        config.embedding.base_url,
        config.embedding.model,
        config.embedding.dimension
    );

    let state = AppState::new(config.clone())?;

    // Authentication happens in the surrounding application.
    let app = Router::new()
        .route("/api/catalogue/ingest", post(api::catalogue::ingest))
        .route("/api/catalogue/{code}", get(api::catalogue::get_by_code))
        .route("/api/classify", post(api::classify::classify_product))
        .route("/api/embeddings/batch", post(api::embeddings::trigger_batch))
        .route("/api/embeddings/status", get(api::embeddings::embedding_status))
        .route("/api/chapters", get(api::chapters::list_chapters))
        .route("/api/chapters/{key}/records", get(api::chapters::chapter_detail))
        .route("/api/suggestions", get(api::suggestions::list_suggestions))
        .route("/api/suggestions/{id}", patch(api::suggestions::update_suggestion))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}
