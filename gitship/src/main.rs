//! gitship - entry point
//!
//! `gitship deploy` builds, commits, pushes and triggers the remote deploy;
//! `gitship serve` runs the deploy endpoint on the application host.

use std::error::Error as StdError;
use std::process::ExitCode;

use clap::Parser;
use is_terminal::IsTerminal;
use tracing::{error, info};

use gitship::app::run::{await_shutdown_signal, run_deploy, run_server};
use gitship::app::settings::Settings;
use gitship::cli::{Cli, Commands};
use gitship::deploy::narrator::Narrator;
use gitship::errors::DeployError;
use gitship::logs::{init_logging, LogLevel, LogOptions};
use gitship::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let version = version_info();
    if let Commands::Version = cli.command {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("gitship {}", version.version),
        }
        return ExitCode::SUCCESS;
    }

    let mut settings = match Settings::load(cli.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to load settings: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(level) = cli.log_level.clone() {
        settings.log_level = level;
    }

    match cli.command {
        Commands::Deploy(args) => {
            // the narrator owns stdout; tracing stays quiet unless asked
            let log_options = LogOptions {
                log_level: cli.log_level.unwrap_or(LogLevel::Warn),
                json_format: settings.log_json,
                ..Default::default()
            };
            let _guard = match init_logging(log_options) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Failed to initialize logging: {e}");
                    None
                }
            };

            let options = args.into_options(std::io::stdin().is_terminal());
            let verbose = options.verbose;
            match run_deploy(settings, options).await {
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    report_failure(&e, verbose);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.server.host = host;
            }
            if let Some(port) = port {
                settings.server.port = port;
            }

            let log_options = LogOptions {
                log_level: settings.log_level.clone(),
                json_format: settings.log_json,
                log_dir: settings.server.log_dir.clone(),
                ..Default::default()
            };
            let _guard = match init_logging(log_options) {
                Ok(guard) => guard,
                Err(e) => {
                    eprintln!("Failed to initialize logging: {e}");
                    None
                }
            };

            info!("Running gitship server {}", version.version);
            match run_server(version.version, settings, await_shutdown_signal()).await {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!("Server failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Version => ExitCode::SUCCESS,
    }
}

fn report_failure(err: &DeployError, verbose: bool) {
    error!("Deploy failed: {}", err);
    let narrator = Narrator::new();
    narrator.fail(&format!("Deploy failed: {}", err));
    if verbose {
        let mut source = err.source();
        while let Some(cause) = source {
            narrator.fail(&format!("caused by: {}", cause));
            source = cause.source();
        }
    }
}
