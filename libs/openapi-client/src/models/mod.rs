//! API models

use serde::{Deserialize, Serialize};

/// Header carrying the shared deploy secret
pub const DEPLOY_TOKEN_HEADER: &str = "X-Deploy-Token";

/// Path of the deploy endpoint relative to the server base URL
pub const DEPLOY_PATH: &str = "/api/deploy";

/// Deploy trigger sent by the client once the push has landed.
///
/// Every field has a default so that a partial body from an older client is
/// still accepted: the token header is the only thing the server trusts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployRequest {
    #[serde(default = "default_commit_hash")]
    pub commit_hash: String,

    #[serde(default)]
    pub repository: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default)]
    pub deployed_by: String,

    /// Local time, `YYYY-MM-DD HH:MM:SS`
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub run_seeders: bool,
}

fn default_commit_hash() -> String {
    "unknown".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

impl Default for DeployRequest {
    fn default() -> Self {
        Self {
            commit_hash: default_commit_hash(),
            repository: String::new(),
            branch: default_branch(),
            deployed_by: String::new(),
            timestamp: String::new(),
            run_seeders: false,
        }
    }
}
