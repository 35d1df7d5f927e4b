//! Settings file and environment configuration

use std::path::{Path, PathBuf};

use anyhow::Context;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::DeployError;
use crate::filesys::file::File;
use crate::logs::LogLevel;

/// Settings file looked up in the working directory when `--config` is absent
pub const DEFAULT_SETTINGS_FILE: &str = "gitship.json";

/// gitship settings, shared by the client and the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Log level
    pub log_level: LogLevel,

    /// Emit JSON log lines
    pub log_json: bool,

    /// Application environment; `local` disables TLS verification on the client
    pub app_env: String,

    /// Shared secret sent in the deploy token header
    pub deploy_token: Option<String>,

    /// Client-side configuration
    pub client: ClientSettings,

    /// Server-side configuration
    pub server: ServerSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_json: false,
            app_env: "production".to_string(),
            deploy_token: None,
            client: ClientSettings::default(),
            server: ServerSettings::default(),
        }
    }
}

/// Client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Root of the git working tree to deploy
    pub project_root: PathBuf,

    /// Repository URL; falls back to the current `origin` remote
    pub repository_url: Option<String>,

    /// Base URL of the deploy server, or the full endpoint URL
    pub server_url: Option<String>,

    /// Explicit npm path
    pub npm_path: Option<String>,

    /// Explicit composer path
    pub composer_path: Option<String>,

    /// Frontend subproject directory, relative to the project root
    pub frontend_dir: String,

    /// Manifest that must exist for the frontend to be built
    pub manifest: String,

    /// Build output directory inside the frontend directory
    pub build_output_dir: String,

    /// File that must exist in the build output after a build
    pub build_artifact: String,

    /// Changed files above this size are reported before commit
    pub large_file_threshold_bytes: u64,

    /// Name sent as `deployed_by`; defaults to the login user
    pub deployed_by: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            repository_url: None,
            server_url: None,
            npm_path: None,
            composer_path: None,
            frontend_dir: "frontend".to_string(),
            manifest: "package.json".to_string(),
            build_output_dir: "dist".to_string(),
            build_artifact: "index.html".to_string(),
            large_file_threshold_bytes: 10 * 1024 * 1024,
            deployed_by: None,
        }
    }
}

impl ClientSettings {
    pub fn frontend_path(&self) -> PathBuf {
        self.project_root.join(&self.frontend_dir)
    }

    /// Build output, relative to the project root (as staged in git)
    pub fn build_output_relative(&self) -> String {
        format!("{}/{}", self.frontend_dir.trim_end_matches('/'), self.build_output_dir)
    }
}

/// Server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Application checkout that deploys are applied to
    pub app_root: PathBuf,

    /// Explicit php path
    pub php_path: Option<String>,

    /// Preferred php binary name for the `PATH` lookup
    pub php_binary: String,

    /// Explicit composer path
    pub composer_path: Option<String>,

    /// Host-specific composer locations checked after `~/bin/composer`
    pub composer_extra_paths: Vec<PathBuf>,

    /// Run composer as `php <composer>` rather than executing it directly
    pub composer_through_php: bool,

    /// Console script inside the app root
    pub artisan: String,

    /// Generate the application key when `APP_KEY` is empty
    pub ensure_app_key: bool,

    /// Directory for a daily rolling log file
    pub log_dir: Option<PathBuf>,

    pub pull_timeout_secs: u64,
    pub install_timeout_secs: u64,
    pub console_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            app_root: PathBuf::from("."),
            php_path: None,
            php_binary: "php8.2".to_string(),
            composer_path: None,
            composer_extra_paths: Vec::new(),
            composer_through_php: true,
            artisan: "artisan".to_string(),
            ensure_app_key: true,
            log_dir: None,
            pull_timeout_secs: 60,
            install_timeout_secs: 300,
            console_timeout_secs: 300,
        }
    }
}

impl Settings {
    /// Load settings once at start-up: `.env`, then the settings file, then
    /// environment overrides.
    pub async fn load(config_file: Option<&Path>) -> Result<Self, DeployError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }

        let mut settings = match config_file {
            Some(path) => Self::read_file(path).await?,
            None => {
                let default_file = File::new(DEFAULT_SETTINGS_FILE);
                if default_file.exists().await {
                    Self::read_file(default_file.path()).await?
                } else {
                    Settings::default()
                }
            }
        };

        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    async fn read_file(path: &Path) -> Result<Self, DeployError> {
        let settings = File::new(path)
            .read_json::<Settings>()
            .await
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Ok(settings)
    }

    /// Apply environment overrides; empty values are ignored
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(level) = get("GITSHIP_LOG_LEVEL").and_then(|v| v.parse().ok()) {
            self.log_level = level;
        }
        if let Some(env) = get("APP_ENV") {
            self.app_env = env;
        }
        if let Some(token) = get("DEPLOY_TOKEN") {
            self.deploy_token = Some(token);
        }
        if let Some(url) = get("GIT_REPOSITORY_URL") {
            self.client.repository_url = Some(url);
        }
        if let Some(url) = get("DEPLOY_SERVER_URL") {
            self.client.server_url = Some(url);
        }
        if let Some(path) = get("NPM_PATH") {
            self.client.npm_path = Some(path);
        }
        if let Some(path) = get("COMPOSER_PATH") {
            self.client.composer_path = Some(path.clone());
            self.server.composer_path = Some(path);
        }
        if let Some(path) = get("PHP_PATH") {
            self.server.php_path = Some(path);
        }
        if let Some(root) = get("APP_ROOT") {
            self.server.app_root = PathBuf::from(root);
        }
        if self.client.deployed_by.is_none() {
            self.client.deployed_by = get("USER").or_else(|| get("USERNAME"));
        }
    }

    /// The deploy token, wrapped so it is not printed by accident.
    ///
    /// A blank value counts as unset; anything else is kept byte for byte.
    pub fn deploy_secret(&self) -> Option<SecretString> {
        self.deploy_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(|t| SecretString::from(t.to_string()))
    }

    pub fn is_local(&self) -> bool {
        self.app_env.eq_ignore_ascii_case("local")
    }
}
