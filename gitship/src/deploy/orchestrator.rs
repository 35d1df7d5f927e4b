//! Client deploy run: build, git sync, notify

use std::sync::Arc;

use openapi_server::DeployReport;
use tracing::{info, instrument};

use crate::app::options::{ClientTimeouts, DeployOptions};
use crate::app::settings::Settings;
use crate::deploy::build::{BuildOutcome, FrontendBuild};
use crate::deploy::confirm::Confirmer;
use crate::deploy::git::GitSync;
use crate::deploy::narrator::Narrator;
use crate::deploy::notifier::{DeployNotifier, NotifyOutcome, RepoState};
use crate::errors::DeployError;
use crate::http::client::ClientOptions;
use crate::process::ProcessRunner;
use crate::tools::{resolve, ToolEnv, ToolPath, ToolSpec};

/// Summary of a client run
#[derive(Debug, Clone)]
pub struct DeployOutcome {
    pub build: Option<BuildOutcome>,
    pub committed: bool,
    pub commit_message: Option<String>,
    pub branch: Option<String>,
    pub commit_hash: Option<String>,
    pub notify: Option<NotifyOutcome>,
}

impl DeployOutcome {
    /// Report returned by the server, if any
    pub fn report(&self) -> Option<&DeployReport> {
        match &self.notify {
            Some(NotifyOutcome::Delivered(report)) => report.as_ref(),
            _ => None,
        }
    }
}

/// Sequences the client stages; any stage error aborts the run
pub struct DeployOrchestrator {
    settings: Settings,
    runner: Arc<dyn ProcessRunner>,
    confirmer: Box<dyn Confirmer>,
    narrator: Narrator,
    env: ToolEnv,
    timeouts: ClientTimeouts,
}

impl DeployOrchestrator {
    pub fn new(
        settings: Settings,
        runner: Arc<dyn ProcessRunner>,
        confirmer: Box<dyn Confirmer>,
        narrator: Narrator,
        env: ToolEnv,
    ) -> Self {
        Self {
            settings,
            runner,
            confirmer,
            narrator,
            env,
            timeouts: ClientTimeouts::default(),
        }
    }

    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn resolve_tools(&self, options: &DeployOptions) -> (ToolPath, ToolPath) {
        let client = &self.settings.client;
        let npm_override = options.npm_path_override.as_deref().or(client.npm_path.as_deref());
        let composer_override = options
            .composer_path_override
            .as_deref()
            .or(client.composer_path.as_deref());

        let npm = resolve(&ToolSpec::npm(), npm_override, &self.env);
        let composer = resolve(&ToolSpec::composer(Vec::new()), composer_override, &self.env);
        (npm, composer)
    }

    #[instrument(skip_all, fields(dry_run = options.dry_run))]
    pub async fn run(&self, options: &DeployOptions) -> Result<DeployOutcome, DeployError> {
        let narrator = &self.narrator;
        if options.dry_run {
            narrator.warn("DRY-RUN mode: nothing will be executed");
        }

        narrator.step("Resolving tools");
        let (npm, composer) = self.resolve_tools(options);
        narrator.line(&format!("npm: {}", npm));
        narrator.line(&format!("composer: {}", composer));
        if npm.is_fallback() && !options.skip_build {
            narrator.warn("npm was not found in any known location, relying on PATH");
        }

        let mut outcome = DeployOutcome {
            build: None,
            committed: false,
            commit_message: None,
            branch: None,
            commit_hash: None,
            notify: None,
        };

        if options.skip_build {
            narrator.step("Building frontend");
            narrator.info("Skipped (--skip-build)");
        } else {
            let build = FrontendBuild::new(
                self.runner.as_ref(),
                &self.settings.client,
                narrator,
                &npm,
                &self.env,
            )
            .with_timeout(self.timeouts.build);
            outcome.build = Some(build.run(options.dry_run).await?);
        }

        let git = GitSync::new(
            self.runner.as_ref(),
            &self.settings.client,
            narrator,
            self.confirmer.as_ref(),
            options.dry_run,
        )
        .with_timeouts(self.timeouts.clone());

        let status = git.check_status().await?;
        if !status.has_changes {
            narrator.warn("No changes to commit");
            git.gate(
                "Continue the deploy without committing?",
                "Continuing without changes (non-interactive mode)",
                "no changes to deploy",
            )?;
        }

        let repository = if options.dry_run {
            self.settings.client.repository_url.clone().unwrap_or_default()
        } else {
            git.repository_url().await?
        };
        git.ensure_remote(&repository).await?;

        if status.has_changes {
            git.stage().await?;
            let message = git.commit(options.commit_message.as_deref()).await?;
            let branch = git.push(options.force_push).await?;
            outcome.committed = true;
            outcome.commit_message = Some(message);
            outcome.branch = Some(branch);
        }

        if options.dry_run {
            narrator.step("Triggering server deploy");
            narrator.dry_run(&format!(
                "POST {} (run_seeders: {})",
                self.settings
                    .client
                    .server_url
                    .as_deref()
                    .map(crate::deploy::notifier::deploy_url)
                    .unwrap_or_else(|| "<DEPLOY_SERVER_URL>".to_string()),
                options.run_seeders_on_server
            ));
            narrator.done("Dry run finished, nothing was executed");
            return Ok(outcome);
        }

        let branch = match &outcome.branch {
            Some(branch) => branch.clone(),
            None => git.current_branch().await,
        };
        let commit_hash = git.head_commit().await;
        outcome.branch = Some(branch.clone());
        outcome.commit_hash = Some(commit_hash.clone());

        let client_options = ClientOptions {
            insecure: options.insecure_tls || self.settings.is_local(),
            timeout: self.timeouts.request,
            connect_timeout: self.timeouts.connect,
        };
        let notifier = DeployNotifier::new(
            narrator,
            self.settings.client.server_url.as_deref(),
            self.settings.deploy_secret(),
            client_options,
        );
        let repo = RepoState {
            commit_hash,
            repository,
            branch,
            deployed_by: self
                .settings
                .client
                .deployed_by
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
        };
        outcome.notify = Some(notifier.notify(&repo, options.run_seeders_on_server).await?);

        info!(
            committed = outcome.committed,
            branch = outcome.branch.as_deref().unwrap_or_default(),
            "Deploy run finished"
        );
        narrator.done("Deploy finished successfully");
        Ok(outcome)
    }
}
