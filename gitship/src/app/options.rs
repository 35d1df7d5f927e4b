//! Per-run options

use std::time::Duration;

/// Options for one client deploy run, built once from the command line
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Commit message; defaults to `Deploy: <timestamp>`
    pub commit_message: Option<String>,

    /// Skip the frontend build
    pub skip_build: bool,

    /// Report intended actions without running processes or network calls
    pub dry_run: bool,

    /// Disable TLS certificate verification for the deploy request
    pub insecure_tls: bool,

    /// Ask the server to run seeders
    pub run_seeders_on_server: bool,

    /// Force-push, overwriting the remote branch
    pub force_push: bool,

    pub npm_path_override: Option<String>,

    pub composer_path_override: Option<String>,

    /// Whether confirmation prompts may be shown
    pub interactive: bool,

    /// Print full error chains
    pub verbose: bool,
}

/// Timeouts used by the client
#[derive(Debug, Clone)]
pub struct ClientTimeouts {
    pub git: Duration,
    pub push: Duration,
    pub build: Duration,
    pub request: Duration,
    pub connect: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            git: Duration::from_secs(60),
            push: Duration::from_secs(300),
            build: Duration::from_secs(600),
            request: Duration::from_secs(300),
            connect: Duration::from_secs(30),
        }
    }
}
