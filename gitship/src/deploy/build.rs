//! Frontend build stage

use std::time::Duration;

use tracing::info;

use crate::app::settings::ClientSettings;
use crate::deploy::narrator::Narrator;
use crate::errors::DeployError;
use crate::filesys::dir::Dir;
use crate::process::{CommandSpec, ProcessRunner};
use crate::tools::{probe, ToolEnv, ToolPath, ToolSpec};

/// Result of the build stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    Built,
    /// No manifest, nothing to build
    Skipped,
    DryRun,
}

/// Builds the frontend subproject with npm
pub struct FrontendBuild<'a> {
    runner: &'a dyn ProcessRunner,
    settings: &'a ClientSettings,
    narrator: &'a Narrator,
    npm: &'a ToolPath,
    env: &'a ToolEnv,
    timeout: Duration,
}

impl<'a> FrontendBuild<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        settings: &'a ClientSettings,
        narrator: &'a Narrator,
        npm: &'a ToolPath,
        env: &'a ToolEnv,
    ) -> Self {
        Self {
            runner,
            settings,
            narrator,
            npm,
            env,
            timeout: Duration::from_secs(600),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn npm_command(&self) -> CommandSpec {
        CommandSpec::new(self.npm.program())
            .cwd(self.settings.frontend_path())
            .envs(self.npm.exec_env(self.env, &ToolSpec::npm()))
    }

    pub async fn run(&self, dry_run: bool) -> Result<BuildOutcome, DeployError> {
        self.narrator.step("Building frontend");
        let frontend = Dir::new(self.settings.frontend_path());

        if dry_run {
            self.narrator.dry_run(&format!(
                "cd {} && {} run build",
                self.settings.frontend_dir,
                self.npm.program()
            ));
            return Ok(BuildOutcome::DryRun);
        }

        let manifest = frontend.file(&self.settings.manifest);
        if !manifest.exists().await {
            self.narrator.warn(&format!(
                "{}/{} not found, skipping the frontend build",
                self.settings.frontend_dir, self.settings.manifest
            ));
            return Ok(BuildOutcome::Skipped);
        }

        if let Err(output) = probe(self.runner, self.npm_command()).await {
            return Err(DeployError::Build(format!(
                "npm is not usable at {}.\n{}\n\
                 Make sure Node.js and npm are installed, or pass --npm-path / set NPM_PATH.",
                self.npm,
                output.trim()
            )));
        }

        self.narrator.line(&format!("Running {} run build...", self.npm.program()));
        let command = self.npm_command().args(["run", "build"]).timeout(self.timeout);
        let result = self.runner.run(&command).await;

        if !result.success() {
            let mut message = format!(
                "`{}` failed with exit code {}",
                command, result.exit_code
            );
            let stderr = result.stderr.trim();
            if !stderr.is_empty() {
                message.push_str(&format!("\nstderr:\n{}", stderr));
            }
            let stdout = result.stdout.trim();
            if !stdout.is_empty() {
                message.push_str(&format!("\nstdout:\n{}", stdout));
            }
            message.push_str(&format!(
                "\nCheck that the dependencies are installed (cd {} && npm install) \
                 and that the build script is defined in {}.",
                self.settings.frontend_dir, self.settings.manifest
            ));
            return Err(DeployError::Build(message));
        }

        let artifact = frontend
            .subdir(&self.settings.build_output_dir)
            .file(&self.settings.build_artifact);
        if !artifact.exists().await {
            return Err(DeployError::Build(format!(
                "build finished but {}/{} was not produced",
                self.settings.build_output_relative(),
                self.settings.build_artifact
            )));
        }

        info!("Frontend built in {} ms", result.duration_ms);
        self.narrator.success("Frontend built");
        Ok(BuildOutcome::Built)
    }
}
