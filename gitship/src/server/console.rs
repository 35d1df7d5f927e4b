//! Application console (`php artisan ...`) invocations

use std::path::PathBuf;
use std::time::Duration;

use crate::process::{CommandSpec, ExecutionResult, ProcessRunner};
use crate::tools::ToolPath;

/// Runs console commands in the application root
pub struct ArtisanConsole<'a> {
    runner: &'a dyn ProcessRunner,
    php: &'a ToolPath,
    php_env: Vec<(String, String)>,
    app_root: PathBuf,
    script: String,
    timeout: Duration,
}

impl<'a> ArtisanConsole<'a> {
    pub fn new(
        runner: &'a dyn ProcessRunner,
        php: &'a ToolPath,
        php_env: Vec<(String, String)>,
        app_root: PathBuf,
        script: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            runner,
            php,
            php_env,
            app_root,
            script: script.to_string(),
            timeout,
        }
    }

    /// `php <script> <args...>` in the app root
    pub fn command(&self, args: &[&str]) -> CommandSpec {
        CommandSpec::new(self.php.program())
            .arg(self.script.clone())
            .args(args.iter().copied())
            .cwd(self.app_root.clone())
            .envs(self.php_env.clone())
            .timeout(self.timeout)
    }

    pub async fn run(&self, args: &[&str]) -> ExecutionResult {
        self.runner.run(&self.command(args)).await
    }
}
