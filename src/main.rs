use anyhow::Result;
use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use rag_workspace::config::Config;
use rag_workspace::{api, state::AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr.clone();
    tracing::info!("Data directory: {}", config.data_dir.display());

    let state = AppState::new(config)?;

    let app = Router::new()
        .route("/api/documents", post(api::documents::upload_document))
        .route(
            "/api/documents/{id}",
            get(api::documents::list_documents).delete(api::documents::delete_document),
        )
        .route("/api/query", post(api::query::query))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on {bind_addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
