//! Deploy trigger: authenticated POST to the remote endpoint

use std::error::Error as StdError;

use openapi_client::{DeployRequest, DEPLOY_PATH};
use openapi_server::{DeployReport, DeployResponse, StepStatus};
use secrecy::{ExposeSecret, SecretString};
use tracing::{error, info};

use crate::deploy::narrator::Narrator;
use crate::errors::{ConnectionFailure, DeployError};
use crate::http::client::{ClientOptions, HttpClient};
use crate::utils::{local_timestamp, redact_token, short_hash};

/// Longest raw response body quoted in an error
const MAX_BODY_EXCERPT: usize = 500;

/// Repository state sent to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoState {
    pub commit_hash: String,
    pub repository: String,
    pub branch: String,
    pub deployed_by: String,
}

/// What the notify step did
#[derive(Debug, Clone)]
pub enum NotifyOutcome {
    /// The server accepted the deploy; the report is absent if the body was not a report
    Delivered(Option<DeployReport>),
    /// Server URL or token not configured
    Skipped(String),
}

/// Full endpoint URL from either a bare base URL or a full endpoint URL
pub fn deploy_url(base: &str) -> String {
    let mut url = base.trim().trim_end_matches('/');
    if let Some(pos) = url.find(DEPLOY_PATH) {
        url = &url[..pos];
    }
    format!("{}{}", url.trim_end_matches('/'), DEPLOY_PATH)
}

/// Classify a connection failure from its error text.
///
/// Resets during the TLS handshake are checked first since their text often
/// also mentions SSL.
pub fn classify_connection_error(message: &str, is_timeout: bool) -> ConnectionFailure {
    let lower = message.to_lowercase();
    if lower.contains("connection reset")
        || lower.contains("reset by peer")
        || lower.contains("curl error 35")
        || lower.contains("unexpected eof")
    {
        ConnectionFailure::TlsReset
    } else if is_timeout || lower.contains("timed out") || lower.contains("timeout") {
        ConnectionFailure::Timeout
    } else if lower.contains("certificate") || lower.contains("ssl") || lower.contains("tls") {
        ConnectionFailure::Certificate
    } else {
        ConnectionFailure::Other
    }
}

/// Message from a failure body: the JSON `message` field, else the raw body
pub fn failure_message(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    if let Some(message) = parsed
        .as_ref()
        .and_then(|v| v.get("message"))
        .and_then(|m| m.as_str())
        .filter(|m| !m.is_empty())
    {
        return message.to_string();
    }
    let body = body.trim();
    if body.is_empty() {
        return "empty response body".to_string();
    }
    match body.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn host_and_port(url: &str) -> Option<(String, u16)> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    Some((host, parsed.port_or_known_default().unwrap_or(443)))
}

/// Sends the deploy trigger
pub struct DeployNotifier<'a> {
    narrator: &'a Narrator,
    server_url: Option<&'a str>,
    token: Option<SecretString>,
    options: ClientOptions,
}

impl<'a> DeployNotifier<'a> {
    pub fn new(
        narrator: &'a Narrator,
        server_url: Option<&'a str>,
        token: Option<SecretString>,
        options: ClientOptions,
    ) -> Self {
        Self {
            narrator,
            server_url: server_url.filter(|u| !u.trim().is_empty()),
            token,
            options,
        }
    }

    pub async fn notify(&self, repo: &RepoState, run_seeders: bool) -> Result<NotifyOutcome, DeployError> {
        self.narrator.step("Triggering server deploy");

        let (base, token) = match (self.server_url, self.token.as_ref()) {
            (Some(base), Some(token)) => (base, token),
            _ => {
                let reason = "DEPLOY_SERVER_URL or DEPLOY_TOKEN is not set, skipping the server deploy";
                self.narrator.warn(reason);
                self.narrator
                    .info("The push went through; run the deploy on the server by hand if needed");
                return Ok(NotifyOutcome::Skipped(reason.to_string()));
            }
        };

        let url = deploy_url(base);
        let request = DeployRequest {
            commit_hash: repo.commit_hash.clone(),
            repository: repo.repository.clone(),
            branch: repo.branch.clone(),
            deployed_by: repo.deployed_by.clone(),
            timestamp: local_timestamp(),
            run_seeders,
        };

        self.narrator.line(&format!("URL: {}", url));
        self.narrator.line(&format!("Commit: {}", short_hash(&request.commit_hash)));
        self.narrator.line(&format!("Branch: {}", request.branch));
        self.narrator
            .line(&format!("Token: {}", redact_token(token.expose_secret())));
        if self.options.insecure {
            self.narrator.warn("TLS certificate verification disabled");
        }
        if run_seeders {
            self.narrator.info("Seeders will run on the server");
        }

        let client = HttpClient::new(&url, &self.options)?;
        let response = match client.post_deploy(token, &request).await {
            Ok(response) => response,
            Err(err) => return Err(self.connection_failure(&url, &err)),
        };

        if !response.status.is_success() {
            let message = failure_message(&response.body);
            error!(status = response.status.as_u16(), "Server rejected the deploy: {}", message);
            return Err(DeployError::RemoteDeploy {
                status: response.status.as_u16(),
                message,
            });
        }

        match serde_json::from_str::<DeployResponse>(&response.body) {
            Ok(body) if !body.success => Err(DeployError::RemoteDeploy {
                status: response.status.as_u16(),
                message: body.message,
            }),
            Ok(body) => {
                self.narrator.success("Server deploy completed");
                if let Some(report) = &body.data {
                    self.print_report(report);
                }
                info!(url = %url, "Deploy notification delivered");
                Ok(NotifyOutcome::Delivered(body.data))
            }
            Err(err) => {
                self.narrator
                    .warn(&format!("Server answered {} with an unexpected body: {}", response.status, err));
                Ok(NotifyOutcome::Delivered(None))
            }
        }
    }

    fn connection_failure(&self, url: &str, err: &reqwest::Error) -> DeployError {
        let message = error_chain(err);
        let kind = classify_connection_error(&message, err.is_timeout());
        error!(kind = %kind, "Deploy request failed: {}", message);

        let (host, port) = host_and_port(url).unwrap_or_else(|| (url.to_string(), 443));
        match kind {
            ConnectionFailure::TlsReset => {
                self.narrator.warn("The connection was reset during the TLS handshake.");
                self.narrator.info(&format!(
                    "Check the certificate with: openssl s_client -connect {}:{}",
                    host, port
                ));
                self.narrator
                    .info("Check that the server URL uses the right scheme (http or https)");
                self.narrator
                    .info("For a self-signed certificate, re-run with --insecure");
            }
            ConnectionFailure::Timeout => {
                self.narrator
                    .warn("The server did not answer in time (timeout).");
                self.narrator.info(&format!("Check that {} is up and reachable", host));
                self.narrator
                    .info("The deploy may still be running on the server; check its log before retrying");
            }
            ConnectionFailure::Certificate => {
                self.narrator.warn("The server certificate could not be verified.");
                self.narrator
                    .info("For a self-signed certificate, re-run with --insecure or set APP_ENV=local");
            }
            ConnectionFailure::Other => {
                self.narrator.warn(&format!("Could not connect to {}.", host));
                self.narrator
                    .info("Check DEPLOY_SERVER_URL and your network connection");
            }
        }

        DeployError::Notify { kind, message }
    }

    fn print_report(&self, report: &DeployReport) {
        self.narrator.line(&format!(
            "Deployed {} on {} in {:.1}s",
            short_hash(&report.commit_hash),
            report.branch,
            report.duration_seconds
        ));
        for tool in &report.tool_paths {
            self.narrator.line(&format!(
                "{}: {} ({}){}",
                tool.name,
                tool.path,
                tool.source,
                tool.version.as_deref().map(|v| format!(" {}", v)).unwrap_or_default()
            ));
        }
        for step in &report.steps {
            let line = format!("{}: {}", step.step, step.summary());
            match step.status {
                StepStatus::Success => self.narrator.success(&line),
                StepStatus::Skipped => self.narrator.info(&line),
                StepStatus::Error | StepStatus::Partial => self.narrator.warn(&line),
            }
        }
    }
}
