//! Utility functions

use serde::{Deserialize, Serialize};

/// Version information for gitship
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Timestamp format shared by commit messages and the wire protocol
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current local time as `YYYY-MM-DD HH:MM:SS`
pub fn local_timestamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Keep the first and last three characters of a secret, e.g. `abc...xyz`.
///
/// Secrets of six characters or fewer are fully masked.
pub fn redact_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 6 {
        return "***".to_string();
    }
    let head: String = chars[..3].iter().collect();
    let tail: String = chars[chars.len() - 3..].iter().collect();
    format!("{}...{}", head, tail)
}

/// First seven characters of a commit hash
pub fn short_hash(hash: &str) -> &str {
    hash.get(..7).unwrap_or(hash)
}
