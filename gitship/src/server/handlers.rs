//! HTTP request handlers

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use openapi_client::{DeployRequest, DEPLOY_TOKEN_HEADER};
use openapi_server::{DeployResponse, HealthResponse};
use tracing::{error, info, Instrument};
use uuid::Uuid;

use crate::errors::DeployError;
use crate::server::state::ServerState;
use crate::utils::local_timestamp;

/// Health check handler
pub async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: state.version.clone(),
        timestamp: local_timestamp(),
    })
}

fn failure(err: &DeployError) -> Response {
    let status = err.status_code();
    let message = match err {
        DeployError::Authorization(_) => "Unauthorized".to_string(),
        DeployError::BadRequest(_) | DeployError::JsonError(_) => err.to_string(),
        _ => "Deploy failed".to_string(),
    };
    (status, Json(DeployResponse::failure(message))).into_response()
}

/// Deploy handler.
///
/// The token is checked before the body is parsed. Once authorized the
/// pipeline runs in its own task, and its step failures are reported in a
/// 200 response.
pub async fn deploy_handler(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let token = headers
        .get(DEPLOY_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok());
    if let Err(e) = state.handler.authorize(token) {
        return failure(&e);
    }

    let request: DeployRequest = if body.is_empty() {
        DeployRequest::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(request) => request,
            Err(e) => return failure(&DeployError::BadRequest(format!("invalid JSON body: {}", e))),
        }
    };
    let deploy_id = Uuid::new_v4();
    info!(%deploy_id, commit = %request.commit_hash, branch = %request.branch, "Deploy request accepted");

    let handler = state.handler.clone();
    let span = tracing::info_span!("deploy", %deploy_id);
    let task = tokio::spawn(async move { handler.execute(&request).await }.instrument(span));

    match task.await {
        Ok(Ok(report)) => (StatusCode::OK, Json(DeployResponse::completed(report))).into_response(),
        Ok(Err(e)) => {
            error!("Deploy failed: {}", e);
            failure(&e)
        }
        Err(e) => {
            error!("Deploy task aborted: {}", e);
            failure(&DeployError::Internal(e.to_string()))
        }
    }
}
