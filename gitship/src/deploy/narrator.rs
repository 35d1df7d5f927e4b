//! Console narration for the deploy command

use colored::Colorize;
use tracing::debug;

/// Prints the per-step deploy log with success, warning and failure markers
#[derive(Debug, Clone, Default)]
pub struct Narrator {
    quiet: bool,
}

impl Narrator {
    pub fn new() -> Self {
        Self { quiet: false }
    }

    /// A narrator that only forwards to tracing
    pub fn quiet() -> Self {
        Self { quiet: true }
    }

    fn emit(&self, line: String) {
        debug!(target: "gitship::narration", "{}", line);
        if !self.quiet {
            println!("{}", line);
        }
    }

    pub fn step(&self, title: &str) {
        self.emit(String::new());
        self.emit(format!("{} {}", "▶".cyan().bold(), title.bold()));
    }

    pub fn line(&self, message: &str) {
        self.emit(format!("  {}", message));
    }

    pub fn info(&self, message: &str) {
        self.emit(format!("  {} {}", "ℹ".blue(), message));
    }

    pub fn success(&self, message: &str) {
        self.emit(format!("  {} {}", "✔".green().bold(), message));
    }

    pub fn warn(&self, message: &str) {
        self.emit(format!("  {} {}", "⚠".yellow().bold(), message.yellow()));
    }

    pub fn dry_run(&self, message: &str) {
        self.emit(format!("  {} {}", "[DRY-RUN]".magenta(), message));
    }

    /// Terminal failure line, on stderr
    pub fn fail(&self, message: &str) {
        debug!(target: "gitship::narration", "FAILED: {}", message);
        if !self.quiet {
            eprintln!("{} {}", "✘".red().bold(), message.red());
        }
    }

    /// Terminal success line
    pub fn done(&self, message: &str) {
        self.emit(String::new());
        self.emit(format!("{} {}", "✔".green().bold(), message.green().bold()));
    }
}
