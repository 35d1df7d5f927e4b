//! Git synchronization: status, remote, stage, commit and push

use std::fmt;

use tracing::{debug, info};

use crate::app::options::ClientTimeouts;
use crate::app::settings::ClientSettings;
use crate::deploy::confirm::Confirmer;
use crate::deploy::narrator::Narrator;
use crate::errors::{DeployError, GitError};
use crate::filesys::dir::Dir;
use crate::filesys::file::File;
use crate::process::{CommandSpec, ExecutionResult, ProcessRunner};
use crate::utils::local_timestamp;

const ARCHIVE_EXTENSIONS: [&str; 5] = [".tar.gz", ".rar", ".zip", ".7z", ".tar"];

/// Branch pushed when the current branch cannot be determined
pub const DEFAULT_BRANCH: &str = "main";

/// A changed file flagged as too large to commit comfortably
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LargeFile {
    pub path: String,
    /// Size on disk, `None` for archives flagged by name
    pub size: Option<u64>,
}

impl fmt::Display for LargeFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.size {
            Some(size) => write!(f, "{} ({:.2} MB)", self.path, size as f64 / 1024.0 / 1024.0),
            None => f.write_str(&self.path),
        }
    }
}

/// Outcome of the status check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub has_changes: bool,
    pub changed_files: Vec<String>,
    pub large_files: Vec<LargeFile>,
}

/// What `ensure_remote` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    Added,
    Updated,
    Unchanged,
    DryRun,
}

/// Why a push failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushFailure {
    NoUpstream,
    Timeout,
    NonFastForward,
    Other,
}

/// Classify a failed push from its error output
pub fn classify_push_failure(output: &str, timed_out: bool) -> PushFailure {
    let lower = output.to_lowercase();
    if lower.contains("no upstream branch") {
        PushFailure::NoUpstream
    } else if timed_out
        || lower.contains("timeout")
        || lower.contains("timed out")
        || lower.contains("exceeded")
    {
        PushFailure::Timeout
    } else if lower.contains("non-fast-forward") || lower.contains("fetch first") {
        PushFailure::NonFastForward
    } else {
        PushFailure::Other
    }
}

/// File names from `git status --porcelain` output
pub fn parse_porcelain(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let name = match line.get(3..) {
                Some(rest) if line.as_bytes().get(2) == Some(&b' ') => rest,
                _ => line.trim_start_matches(|c: char| "MADRCU?! ".contains(c)),
            };
            // renames are reported as `old -> new`
            let name = name.rsplit(" -> ").next().unwrap_or(name);
            name.trim().trim_matches('"').to_string()
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// True for archive names (`rar`, `zip`, `7z`, `tar`, `tar.gz`)
pub fn is_archive(name: &str) -> bool {
    let lower = name.to_lowercase();
    ARCHIVE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// URL of the `origin` remote in `git remote -v` output
pub fn origin_url(remotes: &str) -> Option<String> {
    remotes.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("origin"), Some(url)) => Some(url.to_string()),
            _ => None,
        }
    })
}

/// `Deploy: YYYY-MM-DD HH:MM:SS`
pub fn default_commit_message() -> String {
    format!("Deploy: {}", local_timestamp())
}

/// Git operations against the project's working tree
pub struct GitSync<'a> {
    runner: &'a dyn ProcessRunner,
    settings: &'a ClientSettings,
    narrator: &'a Narrator,
    confirmer: &'a dyn Confirmer,
    timeouts: ClientTimeouts,
    dry_run: bool,
}

impl<'a> GitSync<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        settings: &'a ClientSettings,
        narrator: &'a Narrator,
        confirmer: &'a dyn Confirmer,
        dry_run: bool,
    ) -> Self {
        Self {
            runner,
            settings,
            narrator,
            confirmer,
            timeouts: ClientTimeouts::default(),
            dry_run,
        }
    }

    pub fn with_timeouts(mut self, timeouts: ClientTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    fn git<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new("git")
            .args(args)
            .cwd(self.settings.project_root.clone())
            .timeout(self.timeouts.git)
    }

    async fn run_checked(&self, operation: &str, command: CommandSpec) -> Result<ExecutionResult, GitError> {
        let result = self.runner.run(&command).await;
        if result.success() {
            Ok(result)
        } else {
            Err(GitError::Command {
                operation: operation.to_string(),
                stderr: result.error_output().to_string(),
            })
        }
    }

    /// Query pending changes and flag large files
    pub async fn check_status(&self) -> Result<StatusReport, DeployError> {
        self.narrator.step("Checking git status");

        if self.dry_run {
            self.narrator.dry_run("git status --porcelain");
            return Ok(StatusReport {
                has_changes: true,
                ..Default::default()
            });
        }

        let result = self
            .run_checked("status", self.git(["status", "--porcelain"]))
            .await?;
        let changed_files = parse_porcelain(&result.stdout);

        if changed_files.is_empty() {
            self.narrator.info("No changes detected");
            return Ok(StatusReport::default());
        }

        self.narrator.line("Changes found:");
        for line in result.stdout.lines().filter(|l| !l.trim().is_empty()) {
            self.narrator.line(&format!("  {}", line));
        }

        let large_files = self.find_large_files(&changed_files).await;
        if !large_files.is_empty() {
            self.narrator.warn("Large files detected:");
            for file in &large_files {
                self.narrator.warn(&format!("  - {}", file));
            }
            self.narrator.info("Consider adding them to .gitignore before committing");
            self.gate(
                "Continue with these files?",
                "Continuing with large files (non-interactive mode)",
                "add the large files to .gitignore and retry",
            )?;
        }

        Ok(StatusReport {
            has_changes: true,
            changed_files,
            large_files,
        })
    }

    async fn find_large_files(&self, files: &[String]) -> Vec<LargeFile> {
        let mut large = Vec::new();
        for name in files {
            if is_archive(name) {
                large.push(LargeFile { path: name.clone(), size: None });
                continue;
            }
            let file = File::new(self.settings.project_root.join(name));
            if let Some(size) = file.size().await {
                if size > self.settings.large_file_threshold_bytes {
                    large.push(LargeFile { path: name.clone(), size: Some(size) });
                }
            }
        }
        large
    }

    /// Ask for confirmation when interactive; otherwise log `notice` and proceed
    pub fn gate(&self, prompt: &str, notice: &str, cancel_reason: &str) -> Result<(), DeployError> {
        if !self.confirmer.is_interactive() {
            self.narrator.info(notice);
            return Ok(());
        }
        if self.confirmer.confirm(prompt)? {
            Ok(())
        } else {
            Err(DeployError::Cancelled(cancel_reason.to_string()))
        }
    }

    /// Configured repository URL, else the current `origin` URL
    pub async fn repository_url(&self) -> Result<String, GitError> {
        if let Some(url) = self.settings.repository_url.as_deref().filter(|u| !u.trim().is_empty()) {
            return Ok(url.trim().to_string());
        }
        let result = self.runner.run(&self.git(["remote", "get-url", "origin"])).await;
        let url = result.stdout.trim();
        if result.success() && !url.is_empty() {
            Ok(url.to_string())
        } else {
            Err(GitError::MissingRepository)
        }
    }

    /// Make sure `origin` points at `repository_url`. Idempotent.
    pub async fn ensure_remote(&self, repository_url: &str) -> Result<RemoteAction, DeployError> {
        self.narrator.step("Checking git remote");

        if self.dry_run {
            self.narrator.dry_run("git remote -v");
            return Ok(RemoteAction::DryRun);
        }

        let remotes = self.run_checked("remote", self.git(["remote", "-v"])).await?;

        let action = match origin_url(&remotes.stdout) {
            None => {
                self.narrator.line("Adding origin remote...");
                self.run_checked("remote add", self.git(["remote", "add", "origin", repository_url]))
                    .await?;
                self.narrator.success("Remote origin added");
                RemoteAction::Added
            }
            Some(current) if !current.contains(repository_url) => {
                self.narrator.line(&format!("Updating origin remote (was {})...", current));
                self.run_checked(
                    "remote set-url",
                    self.git(["remote", "set-url", "origin", repository_url]),
                )
                .await?;
                self.narrator.success("Remote origin updated");
                RemoteAction::Updated
            }
            Some(_) => {
                self.narrator.success("Remote origin is configured");
                RemoteAction::Unchanged
            }
        };

        Ok(action)
    }

    /// Force-add the build output, then stage everything else
    pub async fn stage(&self) -> Result<(), DeployError> {
        self.narrator.step("Staging changes");
        let build_output = self.settings.build_output_relative();

        if self.dry_run {
            self.narrator.dry_run(&format!("git add -f {}", build_output));
            self.narrator.dry_run("git add .");
            return Ok(());
        }

        let output_dir = Dir::new(self.settings.project_root.join(&build_output));
        if output_dir.exists().await {
            let result = self.runner.run(&self.git(["add", "-f", build_output.as_str()])).await;
            if result.success() {
                self.narrator.success(&format!("Added {}", build_output));
            } else {
                self.narrator
                    .warn(&format!("Could not add {}: {}", build_output, result.error_output()));
            }
        }

        self.run_checked("add", self.git(["add", "."])).await?;
        self.narrator.success("Files staged");
        Ok(())
    }

    /// Commit staged changes; returns the message used
    pub async fn commit(&self, message: Option<&str>) -> Result<String, DeployError> {
        self.narrator.step("Creating commit");
        let message = message
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .unwrap_or_else(default_commit_message);

        if self.dry_run {
            self.narrator.dry_run(&format!("git commit -m \"{}\"", message));
            return Ok(message);
        }

        let result = self.runner.run(&self.git(["commit", "-m", message.as_str()])).await;
        if !result.success() {
            if result.combined_output().contains("nothing to commit") {
                self.narrator.warn("Nothing to commit");
                return Ok(message);
            }
            return Err(GitError::Command {
                operation: "commit".to_string(),
                stderr: result.error_output().to_string(),
            }
            .into());
        }

        self.narrator.success(&format!("Commit created: {}", message));
        Ok(message)
    }

    /// Current branch name, `main` if it cannot be determined
    pub async fn current_branch(&self) -> String {
        let result = self
            .runner
            .run(&self.git(["rev-parse", "--abbrev-ref", "HEAD"]))
            .await;
        let branch = result.stdout.trim();
        if result.success() && !branch.is_empty() {
            branch.to_string()
        } else {
            debug!("Could not detect the current branch, using {}", DEFAULT_BRANCH);
            DEFAULT_BRANCH.to_string()
        }
    }

    /// Hash of HEAD, `unknown` if it cannot be read
    pub async fn head_commit(&self) -> String {
        let result = self.runner.run(&self.git(["rev-parse", "HEAD"])).await;
        let hash = result.stdout.trim();
        if result.success() && !hash.is_empty() {
            hash.to_string()
        } else {
            "unknown".to_string()
        }
    }

    fn push_command(&self, branch: &str, force: bool, set_upstream: bool) -> CommandSpec {
        let mut args = vec!["push"];
        if force {
            args.push("--force");
        }
        if set_upstream {
            args.push("-u");
        }
        args.extend(["origin", branch]);
        self.git(args).timeout(self.timeouts.push)
    }

    /// Push the current branch to `origin`; returns the branch pushed
    pub async fn push(&self, force: bool) -> Result<String, DeployError> {
        self.narrator.step("Pushing to repository");

        if force {
            self.narrator.warn("Force push requested (--force)");
            self.narrator
                .warn("This overwrites the remote branch and may discard commits!");
        }

        if self.dry_run {
            let command = self.push_command("HEAD", force, false);
            self.narrator.dry_run(&command.to_string());
            return Ok("HEAD".to_string());
        }

        let branch = self.current_branch().await;
        let result = self.runner.run(&self.push_command(&branch, force, false)).await;

        if !result.success() {
            let failure = classify_push_failure(&result.combined_output(), result.timed_out());
            if failure != PushFailure::NoUpstream {
                return Err(push_error(failure, &result, force).into());
            }

            self.narrator
                .line(&format!("Setting upstream for branch {}...", branch));
            let retry = self.runner.run(&self.push_command(&branch, force, true)).await;
            if !retry.success() {
                let failure = classify_push_failure(&retry.combined_output(), retry.timed_out());
                return Err(push_error(failure, &retry, force).into());
            }
        }

        info!("Pushed {} to origin{}", branch, if force { " (force)" } else { "" });
        self.narrator.success(&format!(
            "Changes pushed to branch: {}{}",
            branch,
            if force { " (force push)" } else { "" }
        ));
        Ok(branch)
    }
}

fn push_error(failure: PushFailure, result: &ExecutionResult, force: bool) -> GitError {
    match failure {
        PushFailure::Timeout => GitError::PushTimeout,
        PushFailure::NonFastForward if !force => GitError::NonFastForward,
        _ => GitError::Command {
            operation: "push".to_string(),
            stderr: result.error_output().to_string(),
        },
    }
}
