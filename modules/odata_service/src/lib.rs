//! HTTP surface of the CDS OData server.
//!
//! Mounts every service of a [`cds_model::Model`] under `/odata/v4/{service}`
//! and `/v2/{service}`, translates requests to CQN through `odata-cqn`, runs
//! them on a [`QueryExecutor`], and serves an index page, a health endpoint
//! and static assets next to them.

pub mod actions;
pub mod api;
pub mod config;
pub mod error;
pub mod executor;
pub mod state;
pub mod trace;

pub use actions::{ActionCall, ActionError, ActionRegistry};
pub use api::rest::routes::build_router;
pub use config::ServiceSettings;
pub use error::ApiError;
pub use executor::{ExecError, ExecResult, MemoryStore, QueryExecutor};
pub use state::{AppState, MountedService};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<F>(state: Arc<AppState>, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("HTTP server bound on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| anyhow::anyhow!(e))
}
