//! Server-side deploy pipeline.
//!
//! Every step yields exactly one [`StepResult`], in [`StepKind::ORDER`]. A
//! failing step is recorded and the pipeline moves on; only a missing
//! application root aborts the run.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use openapi_client::DeployRequest;
use openapi_server::{DeployReport, StepKind, StepResult, StepStatus, ToolPathInfo};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info, warn};

use crate::app::settings::ServerSettings;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::process::{CommandSpec, ExecutionResult, ProcessRunner};
use crate::server::console::ArtisanConsole;
use crate::tools::{combined_exec_env, probe, resolve, ToolEnv, ToolPath, ToolSpec};
use crate::utils::{local_timestamp, redact_token};

/// Lines of process output kept in a step detail
const DETAIL_LINES: usize = 20;

const CACHE_CLEAR_COMMANDS: [&str; 3] = ["config:clear", "route:clear", "view:clear"];

/// Last lines of a process output, trimmed
pub fn output_excerpt(output: &str) -> String {
    let lines: Vec<&str> = output.trim().lines().collect();
    let start = lines.len().saturating_sub(DETAIL_LINES);
    lines[start..].join("\n")
}

/// Branch names are passed to git as arguments; refuse anything git could
/// read as an option.
pub fn valid_branch(branch: &str) -> bool {
    let branch = branch.trim();
    !branch.is_empty() && !branch.starts_with('-') && !branch.contains(char::is_whitespace)
}

fn tokens_match(expected: &str, provided: &str) -> bool {
    let (a, b) = (expected.as_bytes(), provided.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// True if a `.env` file body sets a non-empty `APP_KEY`
pub fn has_app_key(env_file: &str) -> bool {
    env_file.lines().any(|line| {
        line.trim()
            .strip_prefix("APP_KEY=")
            .map(|v| !v.trim().trim_matches('"').trim_matches('\'').is_empty())
            .unwrap_or(false)
    })
}

/// Resolved tools for one run
struct Toolchain {
    php: ToolPath,
    php_spec: ToolSpec,
    composer: ToolPath,
    composer_spec: ToolSpec,
}

/// Authorizes and executes server-side deploys
pub struct DeployHandler {
    settings: ServerSettings,
    secret: Option<SecretString>,
    runner: Arc<dyn ProcessRunner>,
    env: ToolEnv,
}

impl DeployHandler {
    pub fn new(
        settings: ServerSettings,
        secret: Option<SecretString>,
        runner: Arc<dyn ProcessRunner>,
        env: ToolEnv,
    ) -> Self {
        Self {
            settings,
            secret,
            runner,
            env,
        }
    }

    /// Check the token header against the configured secret
    pub fn authorize(&self, provided: Option<&str>) -> Result<(), DeployError> {
        let expected = match &self.secret {
            Some(secret) => secret.expose_secret(),
            None => {
                error!("DEPLOY_TOKEN is not configured on the server");
                return Err(DeployError::Misconfigured(
                    "deploy token not configured".to_string(),
                ));
            }
        };

        let provided = provided.unwrap_or_default();
        if provided.is_empty() || !tokens_match(expected, provided) {
            warn!(
                token = %redact_token(provided),
                "Rejected deploy request with an invalid token"
            );
            return Err(DeployError::Authorization("invalid deploy token".to_string()));
        }
        Ok(())
    }

    fn app_root(&self) -> &Path {
        &self.settings.app_root
    }

    fn resolve_tools(&self) -> Toolchain {
        let php_spec = ToolSpec::php(&self.settings.php_binary);
        let php = resolve(&php_spec, self.settings.php_path.as_deref(), &self.env);
        let composer_spec = ToolSpec::composer(self.settings.composer_extra_paths.clone());
        let composer = resolve(&composer_spec, self.settings.composer_path.as_deref(), &self.env);
        info!(php = %php, composer = %composer, "Resolved server tools");
        Toolchain {
            php,
            php_spec,
            composer,
            composer_spec,
        }
    }

    /// Run the deploy steps for an authorized request
    pub async fn execute(&self, request: &DeployRequest) -> Result<DeployReport, DeployError> {
        let started = Instant::now();
        info!(
            commit = %request.commit_hash,
            branch = %request.branch,
            deployed_by = %request.deployed_by,
            run_seeders = request.run_seeders,
            "Starting deploy"
        );

        if !Dir::new(self.app_root()).exists().await {
            return Err(DeployError::ServerError(format!(
                "application root {} does not exist",
                self.app_root().display()
            )));
        }

        let tools = self.resolve_tools();
        let php_env = tools.php.exec_env(&self.env, &tools.php_spec);
        let console = ArtisanConsole::new(
            self.runner.as_ref(),
            &tools.php,
            php_env,
            self.app_root().to_path_buf(),
            &self.settings.artisan,
            Duration::from_secs(self.settings.console_timeout_secs),
        );

        let php_version = probe(self.runner.as_ref(), CommandSpec::new(tools.php.program()))
            .await
            .map_err(|e| warn!("php is not usable at {}: {}", tools.php, e))
            .ok();

        if self.settings.ensure_app_key {
            self.ensure_app_key(&console).await;
        }

        let mut composer_version = None;
        let mut steps = Vec::with_capacity(StepKind::ORDER.len());
        for kind in StepKind::ORDER {
            let result = match kind {
                StepKind::GitPull => self.git_pull(&request.branch).await,
                StepKind::DependencyInstall => {
                    let (result, version) = self.composer_install(&tools).await;
                    composer_version = version;
                    result
                }
                StepKind::Migrations => {
                    console_step(kind, console.run(&["migrate", "--force"]).await)
                }
                StepKind::Seeders if request.run_seeders => {
                    console_step(kind, console.run(&["db:seed", "--force"]).await)
                }
                StepKind::Seeders => StepResult::skipped(kind, "run_seeders is false"),
                StepKind::CacheClear => self.cache_clear(&console).await,
            };
            log_step(&result);
            steps.push(result);
        }

        let tool_paths: Vec<ToolPathInfo> = vec![
            tools.php.info(php_version),
            tools.composer.info(composer_version),
        ];

        let report = DeployReport {
            commit_hash: request.commit_hash.clone(),
            branch: request.branch.clone(),
            tool_paths,
            steps,
            duration_seconds: (started.elapsed().as_secs_f64() * 100.0).round() / 100.0,
            deployed_at: local_timestamp(),
        };

        info!(
            commit = %report.commit_hash,
            branch = %report.branch,
            duration_seconds = report.duration_seconds,
            failed_steps = report
                .steps
                .iter()
                .filter(|s| s.status == StepStatus::Error)
                .count(),
            "Deploy finished"
        );
        Ok(report)
    }

    async fn git_pull(&self, branch: &str) -> StepResult {
        let kind = StepKind::GitPull;
        if !valid_branch(branch) {
            return StepResult::error(kind, format!("invalid branch name: {:?}", branch));
        }

        let command = CommandSpec::new("git")
            .args(["pull", "origin", branch.trim()])
            .cwd(self.app_root().to_path_buf())
            .timeout(Duration::from_secs(self.settings.pull_timeout_secs));
        let result = self.runner.run(&command).await;
        if result.success() {
            StepResult::success(kind, output_excerpt(&result.combined_output()))
        } else {
            StepResult::error(kind, output_excerpt(result.error_output()))
        }
    }

    fn composer_base(&self, tools: &Toolchain) -> CommandSpec {
        // php first: composer scripts call `php` through PATH
        let env = combined_exec_env(
            &[(&tools.php, &tools.php_spec), (&tools.composer, &tools.composer_spec)],
            &self.env,
        );

        // a bare `composer` name cannot be handed to php as a script
        let command = if self.settings.composer_through_php && !tools.composer.is_fallback() {
            CommandSpec::new(tools.php.program()).arg(tools.composer.program())
        } else {
            CommandSpec::new(tools.composer.program())
        };
        command.cwd(self.app_root().to_path_buf()).envs(env)
    }

    async fn composer_install(&self, tools: &Toolchain) -> (StepResult, Option<String>) {
        let kind = StepKind::DependencyInstall;
        let base = self.composer_base(tools);

        let version = match probe(self.runner.as_ref(), base.clone()).await {
            Ok(version) => version,
            Err(output) => {
                return (
                    StepResult::error(
                        kind,
                        format!(
                            "composer is not usable at {}: {}",
                            tools.composer,
                            output_excerpt(&output)
                        ),
                    ),
                    None,
                )
            }
        };
        debug!("composer version: {}", version);

        let command = base
            .args(["install", "--no-dev", "--optimize-autoloader", "--no-interaction"])
            .timeout(Duration::from_secs(self.settings.install_timeout_secs));
        let result = self.runner.run(&command).await;
        let step = if result.success() {
            StepResult::success(kind, output_excerpt(&result.combined_output()))
        } else {
            StepResult::error(kind, output_excerpt(result.error_output()))
        };
        (step, Some(version))
    }

    async fn cache_clear(&self, console: &ArtisanConsole<'_>) -> StepResult {
        let kind = StepKind::CacheClear;
        for command in CACHE_CLEAR_COMMANDS {
            let result = console.run(&[command]).await;
            if !result.success() {
                return StepResult::error(
                    kind,
                    format!("{} failed: {}", command, output_excerpt(result.error_output())),
                );
            }
        }

        let result = console.run(&["cache:clear"]).await;
        if result.success() {
            StepResult::success(kind, "config, route, view and application caches cleared")
        } else {
            StepResult::partial(
                kind,
                format!("cache:clear failed: {}", output_excerpt(result.error_output())),
            )
        }
    }

    async fn ensure_app_key(&self, console: &ArtisanConsole<'_>) {
        let env_file = crate::filesys::file::File::new(self.app_root().join(".env"));
        let contents = match env_file.read_string().await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("No readable .env in the app root ({}), not checking APP_KEY", e);
                return;
            }
        };
        if has_app_key(&contents) {
            return;
        }

        info!("APP_KEY is empty, generating an application key");
        let result = console.run(&["key:generate", "--force"]).await;
        if result.success() {
            info!("Application key generated");
        } else {
            warn!("key:generate failed: {}", result.error_output());
        }
    }
}

fn console_step(kind: StepKind, result: ExecutionResult) -> StepResult {
    if result.success() {
        StepResult::success(kind, output_excerpt(&result.combined_output()))
    } else {
        StepResult::error(kind, output_excerpt(result.error_output()))
    }
}

fn log_step(result: &StepResult) {
    match result.status {
        StepStatus::Success | StepStatus::Skipped => {
            info!(step = %result.step, status = result.status.as_str(), "{}", result.detail)
        }
        StepStatus::Partial | StepStatus::Error => {
            warn!(step = %result.step, status = result.status.as_str(), "{}", result.detail)
        }
    }
}
