//! ctlrun
//!
//! Runs an action from a control file and optionally keeps serving the
//! socket shell and the HTTP front-end until `quit` or Ctrl-C.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use ctlrun::{
    args::{Cli, Invocation},
    config::AppConfig,
    http::{self, HttpState},
    logging::{init_tracing, LoggingLevelCommand},
    shell,
};
use ctlrun_core::{create_default_registry, ControlFile, Interpreter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_handle = init_tracing();

    let cli = Cli::parse();
    let invocation = Invocation::parse(&cli.args)?;

    let config = AppConfig::from_env().context("Invalid CTLRUN_* configuration")?;

    let mut registry = create_default_registry();
    registry.register(LoggingLevelCommand::new(log_handle));
    let interp = Interpreter::new(registry);

    tracing::info!(
        commands = interp.registry().len(),
        control_file = ?invocation.control_file,
        port = ?invocation.port,
        "Starting ctlrun"
    );

    let shutdown = interp.shutdown().clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        shutdown.trigger();
    });

    let control = match &invocation.control_file {
        Some(path) => Some(Arc::new(ControlFile::load(path)?)),
        None => None,
    };

    let mut succeeded = true;
    if let Some(control) = &control {
        let action = invocation
            .action
            .as_deref()
            .unwrap_or(config.default_action.as_str());
        let mut variables = invocation.variables.clone();
        let mut stdout = std::io::stdout();
        succeeded = interp
            .run_control_file(control.clone(), action, &mut variables, &mut stdout)
            .await?;
    }

    let mut servers: Vec<JoinHandle<std::io::Result<()>>> = Vec::new();

    if let Some(port) = invocation.port.or(config.shell_port) {
        let address = config.bind_address(port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Cannot bind shell to {}", address))?;
        servers.push(tokio::spawn(shell::serve(
            interp.clone(),
            listener,
            config.prompt.clone(),
        )));
    }

    if let Some(port) = config.http_port {
        let address = config.bind_address(port);
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Cannot bind HTTP server to {}", address))?;
        tracing::info!(address = %address, "HTTP server listening");

        let app = http::router(HttpState::new(interp.clone(), control.clone()));
        let shutdown = interp.shutdown().clone();
        servers.push(tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await
        }));
    }

    let serving = !servers.is_empty();
    let repeating = interp.repeating_actions();
    if serving || !repeating.is_empty() {
        tracing::info!(repeating = ?repeating, "Serving until shutdown");
        interp.shutdown().wait().await;
    }

    for server in servers {
        match server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Server stopped with error"),
            Err(e) => tracing::warn!(error = %e, "Server task failed"),
        }
    }

    interp.join_repeats().await;
    if let Err(e) = interp.runtime().wait_background().await {
        tracing::warn!(error = %e, "Background operation failed");
    }

    tracing::info!("ctlrun stopped");

    if !succeeded && !serving {
        bail!("Control file run failed");
    }
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
