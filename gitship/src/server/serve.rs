//! HTTP server setup

use std::future::Future;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use openapi_client::DEPLOY_PATH;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::errors::DeployError;
use crate::server::handlers::{deploy_handler, health_handler};
use crate::server::state::ServerState;

/// Path of the health endpoint
pub const HEALTH_PATH: &str = "/api/health";

/// Routes of the deploy server
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .route(DEPLOY_PATH, post(deploy_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until `shutdown_signal` resolves.
///
/// Returns the bound address (useful with port 0) and the server task.
pub async fn serve(
    addr: &str,
    state: Arc<ServerState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(std::net::SocketAddr, JoinHandle<Result<(), DeployError>>), DeployError> {
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| DeployError::ServerError(format!("cannot bind {}: {}", addr, e)))?;
    let local_addr = listener
        .local_addr()
        .map_err(|e| DeployError::ServerError(e.to_string()))?;
    info!("Deploy server listening on {}", local_addr);

    let handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| DeployError::ServerError(e.to_string()))
    });

    Ok((local_addr, handle))
}
