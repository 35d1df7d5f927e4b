//! Deploy endpoint models

use serde::{Deserialize, Serialize};

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Envelope returned by `POST /api/deploy`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DeployReport>,
}

impl DeployResponse {
    pub fn completed(report: DeployReport) -> Self {
        Self {
            success: true,
            message: "Deploy completed".to_string(),
            data: Some(report),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Outcome of one server-side deploy run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployReport {
    pub commit_hash: String,
    pub branch: String,
    #[serde(default)]
    pub tool_paths: Vec<ToolPathInfo>,
    pub steps: Vec<StepResult>,
    pub duration_seconds: f64,
    pub deployed_at: String,
}

impl DeployReport {
    /// Look up the entry for a step
    pub fn step(&self, kind: StepKind) -> Option<&StepResult> {
        self.steps.iter().find(|s| s.step == kind)
    }
}

/// Executable resolved on the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPathInfo {
    pub name: String,
    pub path: String,
    /// How the path was found: override, env, which, well-known or fallback
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Server-side deploy steps, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    GitPull,
    #[serde(rename = "composer_install", alias = "dependency_install")]
    DependencyInstall,
    Migrations,
    Seeders,
    CacheClear,
}

impl StepKind {
    /// Fixed execution order
    pub const ORDER: [StepKind; 5] = [
        StepKind::GitPull,
        StepKind::DependencyInstall,
        StepKind::Migrations,
        StepKind::Seeders,
        StepKind::CacheClear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepKind::GitPull => "git_pull",
            StepKind::DependencyInstall => "composer_install",
            StepKind::Migrations => "migrations",
            StepKind::Seeders => "seeders",
            StepKind::CacheClear => "cache_clear",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Error,
    Partial,
    Skipped,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Success => "success",
            StepStatus::Error => "error",
            StepStatus::Partial => "partial",
            StepStatus::Skipped => "skipped",
        }
    }
}

/// Result entry for one step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepResult {
    pub step: StepKind,
    pub status: StepStatus,
    #[serde(default)]
    pub detail: String,
}

impl StepResult {
    pub fn success(step: StepKind, detail: impl Into<String>) -> Self {
        Self { step, status: StepStatus::Success, detail: detail.into() }
    }

    pub fn error(step: StepKind, detail: impl Into<String>) -> Self {
        Self { step, status: StepStatus::Error, detail: detail.into() }
    }

    pub fn partial(step: StepKind, detail: impl Into<String>) -> Self {
        Self { step, status: StepStatus::Partial, detail: detail.into() }
    }

    pub fn skipped(step: StepKind, detail: impl Into<String>) -> Self {
        Self { step, status: StepStatus::Skipped, detail: detail.into() }
    }

    /// One-line form such as `success` or `error: <detail>`
    pub fn summary(&self) -> String {
        match self.status {
            StepStatus::Success => "success".to_string(),
            _ if self.detail.is_empty() => self.status.as_str().to_string(),
            _ => format!("{}: {}", self.status.as_str(), self.detail.trim()),
        }
    }
}
