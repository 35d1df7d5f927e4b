//! Command line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::app::options::DeployOptions;
use crate::logs::LogLevel;

/// gitship - build, push and trigger a remote deploy
#[derive(Parser, Debug)]
#[command(name = "gitship")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Settings file (defaults to ./gitship.json when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build the frontend, commit, push and trigger the server deploy
    Deploy(DeployArgs),

    /// Serve the deploy endpoint
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Print version information
    Version,
}

#[derive(Args, Debug, Default, Clone)]
pub struct DeployArgs {
    /// Commit message (default: "Deploy: <timestamp>")
    #[arg(short, long)]
    pub message: Option<String>,

    /// Skip the frontend build
    #[arg(long)]
    pub skip_build: bool,

    /// Dry run - show what would be done
    #[arg(long)]
    pub dry_run: bool,

    /// Disable TLS certificate verification (self-signed certificates)
    #[arg(long)]
    pub insecure: bool,

    /// Run database seeders on the server
    #[arg(long)]
    pub with_seed: bool,

    /// Force push, overwriting the remote branch
    #[arg(long)]
    pub force: bool,

    /// Path to npm
    #[arg(long)]
    pub npm_path: Option<String>,

    /// Path to composer
    #[arg(long)]
    pub composer_path: Option<String>,

    /// Never prompt; continue past confirmation gates
    #[arg(short = 'n', long)]
    pub no_interaction: bool,

    /// Print full error details
    #[arg(short, long)]
    pub verbose: bool,
}

impl DeployArgs {
    /// Per-run options; `stdin_is_terminal` decides interactivity once
    pub fn into_options(self, stdin_is_terminal: bool) -> DeployOptions {
        DeployOptions {
            interactive: !self.no_interaction && stdin_is_terminal,
            commit_message: self.message,
            skip_build: self.skip_build,
            dry_run: self.dry_run,
            insecure_tls: self.insecure,
            run_seeders_on_server: self.with_seed,
            force_push: self.force,
            npm_path_override: self.npm_path,
            composer_path_override: self.composer_path,
            verbose: self.verbose,
        }
    }
}
