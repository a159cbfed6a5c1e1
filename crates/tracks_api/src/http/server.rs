use crate::http::{index, list_tracks};
use anyhow::Context;
use axum::routing::get;
use axum::Router;
use common::domain::LocationRepository;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 1323,
        }
    }
}

impl HttpServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

pub fn tracks_router(location_repository: Arc<dyn LocationRepository>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/tracks", get(list_tracks))
        .layer(TraceLayer::new_for_http())
        .with_state(location_repository)
}

/// Serves the read endpoint until `token` is cancelled, then drains open
/// requests before returning.
pub async fn run_tracks_http_server(
    config: HttpServerConfig,
    location_repository: Arc<dyn LocationRepository>,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let address = config.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {}", address))?;

    info!(address = %address, "tracks HTTP server listening");

    axum::serve(listener, tracks_router(location_repository))
        .with_graceful_shutdown(async move { token.cancelled().await })
        .await
        .context("tracks HTTP server failed")?;

    info!("tracks HTTP server stopped");
    Ok(())
}
