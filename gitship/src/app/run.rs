//! Entry points for the client deploy run and the deploy server

use std::future::Future;
use std::sync::Arc;

use tracing::{error, info};

use crate::app::options::DeployOptions;
use crate::app::settings::Settings;
use crate::deploy::confirm::confirmer_for;
use crate::deploy::narrator::Narrator;
use crate::deploy::{DeployOrchestrator, DeployOutcome};
use crate::errors::DeployError;
use crate::process::{ProcessRunner, SystemRunner};
use crate::server::{serve, DeployHandler, ServerState};
use crate::tools::ToolEnv;

/// Run one client deploy
pub async fn run_deploy(settings: Settings, options: DeployOptions) -> Result<DeployOutcome, DeployError> {
    info!(
        dry_run = options.dry_run,
        skip_build = options.skip_build,
        interactive = options.interactive,
        "Starting deploy"
    );

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
    let orchestrator = DeployOrchestrator::new(
        settings,
        runner,
        confirmer_for(options.interactive),
        Narrator::new(),
        ToolEnv::from_process(),
    );
    orchestrator.run(&options).await
}

/// Serve the deploy endpoint until `shutdown_signal` resolves
pub async fn run_server(
    version: String,
    settings: Settings,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<(), DeployError> {
    let secret = settings.deploy_secret();
    if secret.is_none() {
        error!("DEPLOY_TOKEN is not set: every deploy request will be refused");
    }
    info!(
        app_root = %settings.server.app_root.display(),
        "Initializing deploy server..."
    );

    let handler = DeployHandler::new(
        settings.server.clone(),
        secret,
        Arc::new(SystemRunner::new()),
        ToolEnv::from_process(),
    );
    let state = Arc::new(ServerState::new(Arc::new(handler), version));

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let (_, handle) = serve(&addr, state, shutdown_signal).await?;

    handle
        .await
        .map_err(|e| DeployError::ServerError(e.to_string()))??;
    info!("Shutdown complete");
    Ok(())
}

/// Resolves on SIGTERM, SIGINT or Ctrl+C
pub async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                _ => {
                    error!("Unable to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
