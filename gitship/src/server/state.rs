//! Server state

use std::sync::Arc;

use crate::server::pipeline::DeployHandler;

/// State shared across handlers; read-only after start-up
pub struct ServerState {
    pub handler: Arc<DeployHandler>,
    pub version: String,
}

impl ServerState {
    pub fn new(handler: Arc<DeployHandler>, version: String) -> Self {
        Self { handler, version }
    }
}
