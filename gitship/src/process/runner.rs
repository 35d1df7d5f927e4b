//! External process execution

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

/// Exit code reported when a process is killed for exceeding its timeout
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when a process could not be started
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

/// Marker placed at the start of stderr when a process times out
pub const TIMEOUT_MARKER: &str = "timeout: process exceeded";

/// A command to execute, with its working directory, environment overrides
/// and timeout.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    /// Merged on top of the inherited environment
    pub env: Vec<(String, String)>,
    pub timeout: Option<Duration>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// True if the program and the leading arguments match `parts`
    pub fn starts_with(&self, parts: &[&str]) -> bool {
        let mut words = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        parts.iter().all(|part| words.next() == Some(*part))
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Captured outcome of one process invocation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExecutionResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE && self.stderr.starts_with(TIMEOUT_MARKER)
    }

    /// stderr if non-empty, otherwise stdout, trimmed
    pub fn error_output(&self) -> &str {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim()
        } else {
            stderr
        }
    }

    /// stdout and stderr joined, trimmed
    pub fn combined_output(&self) -> String {
        let parts: Vec<&str> = [self.stdout.trim(), self.stderr.trim()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        parts.join("\n")
    }
}

/// Executes external commands.
///
/// A non-zero exit, a timeout or a failure to spawn are all reported through
/// [`ExecutionResult`]; callers inspect `exit_code` and `stderr`.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec) -> ExecutionResult;
}

/// Runs commands on the host with `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessRunner for SystemRunner {
    async fn run(&self, spec: &CommandSpec) -> ExecutionResult {
        debug!("Running: {}", spec);
        let started = Instant::now();

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &spec.cwd {
            command.current_dir(cwd);
        }

        let output = match spec.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(output) => output,
                Err(_) => {
                    warn!("{} timed out after {}s", spec.program, limit.as_secs());
                    return ExecutionResult {
                        exit_code: TIMEOUT_EXIT_CODE,
                        stdout: String::new(),
                        stderr: format!("{} {}s limit: {}", TIMEOUT_MARKER, limit.as_secs(), spec),
                        duration_ms: elapsed_ms(started),
                    };
                }
            },
            None => command.output().await,
        };

        match output {
            Ok(output) => ExecutionResult {
                // killed by a signal
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                duration_ms: elapsed_ms(started),
            },
            Err(e) => ExecutionResult {
                exit_code: SPAWN_FAILURE_EXIT_CODE,
                stdout: String::new(),
                stderr: format!("failed to start `{}`: {}", spec.program, e),
                duration_ms: elapsed_ms(started),
            },
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
