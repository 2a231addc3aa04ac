//! Run command - supervise daemons and rotate on schedule

use super::{console, RunArgs};
use crate::scheduler::{Rotator, RotatorHandle};
use anyhow::Result;
use std::path::Path;
use std::process::ExitCode;
use tokio::io::BufReader;
use tracing::{error, info, warn};

/// Run until Ctrl-C, SIGTERM or console `quit`
///
/// Exits non-zero when a daemon could not be killed during cleanup.
pub async fn run_daemon(config_dir: &Path, args: &RunArgs) -> Result<ExitCode> {
    info!("rustrotate v{} starting", crate::VERSION);

    let config = super::load(config_dir, args.config.as_deref())?;
    let rotator = Rotator::from_config(&config)?;
    let handle = rotator.handle();

    let mut front_end = Vec::new();
    if !args.no_console {
        front_end.push(tokio::spawn(console::print_events(handle.subscribe())));
        let console_handle = handle.clone();
        front_end.push(tokio::spawn(async move {
            let stdin = BufReader::new(tokio::io::stdin());
            if let Err(e) = console::run(console_handle, stdin).await {
                warn!("Console stopped: {:#}", e);
            }
        }));
    }

    wait_for_shutdown(&handle).await;
    info!("Shutting down");

    let result = rotator.shutdown().await;
    for task in front_end {
        task.abort();
    }

    match result {
        Ok(()) => {
            info!("Shutdown complete");
            Ok(ExitCode::SUCCESS)
        },
        Err(e) => {
            error!("Cleanup failed for {}: {}", e.daemon(), e);
            Ok(ExitCode::FAILURE)
        },
    }
}

async fn wait_for_shutdown(handle: &RotatorHandle) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C"),
        () = terminate => info!("Received SIGTERM"),
        () = handle.cancelled() => info!("Shutdown requested"),
    }
}
