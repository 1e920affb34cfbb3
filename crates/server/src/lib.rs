mod error;
mod routes;

use std::net::SocketAddr;
use std::time::Duration;

use tracelens_core::config::Config;
use tracelens_core::error::{EngineError, Result};
use tracelens_store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub query_timeout: Duration,
    pub default_limit: usize,
    pub max_limit: usize,
}

pub fn router(store: Store, cfg: &Config) -> axum::Router {
    routes::router(AppState {
        store,
        query_timeout: cfg.query_timeout,
        default_limit: cfg.default_limit,
        max_limit: cfg.max_limit,
    })
}

pub async fn serve(store: Store, cfg: &Config) -> Result<()> {
    let addr: SocketAddr = cfg.http_addr.parse().map_err(|e| {
        EngineError::Validation(format!("invalid http_addr {:?}: {e}", cfg.http_addr))
    })?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| EngineError::Internal(format!("bind {addr} failed: {e}")))?;
    tracing::info!(%addr, "query facade listening");
    axum::serve(listener, router(store, cfg))
        .await
        .map_err(|e| EngineError::Internal(format!("http server failed: {e}")))
}
