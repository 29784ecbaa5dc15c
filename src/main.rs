use std::time::Duration;

use clap::Parser;
use color_eyre::{eyre::WrapErr, Result};
use uart_alu::{cli, logging, run_state::RunState, session};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use tracing::{debug, error, info};

/// How long the session gets to shut down in order after a signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

#[cfg(unix)]
async fn stop_signal() -> std::io::Result<&'static str> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|_| "Ctrl-C"),
        _ = hangup.recv() => Ok("hangup"),
        _ = terminate.recv() => Ok("terminate"),
    }
}

#[cfg(not(unix))]
async fn stop_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|_| "Ctrl-C")
}

/// Resolves with the name of the signal once told to stop.
///
/// If signals can't be listened for, this never resolves and the session runs to its own end.
async fn told_to_stop(
    signal: impl std::future::Future<Output = std::io::Result<&'static str>>,
) -> &'static str {
    match signal.await {
        Ok(signal) => signal,
        Err(e) => {
            error!(?e, "Could not listen for signals");
            std::future::pending().await
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();
    let config = cli.load_config().wrap_err("Could not load the configuration")?;

    if let Some(command) = cli.command {
        println!("{}", cli::handle_command(command, &config)?);

        return Ok(());
    }

    logging::init(cli.log_dir.clone().map(|dir| (cli.log_level, dir))).await;
    debug!(?config, "Configuration");

    let run_state = RunState::new();
    let options = cli.session_options(config);

    let mut session = tokio::task::spawn_blocking({
        let run_state = run_state.clone();
        move || session::run(options, run_state)
    });

    let outcome = tokio::select! {
        outcome = &mut session => outcome,
        signal = told_to_stop(stop_signal()) => {
            info!(signal, "Told to stop");
            run_state.request_stop();

            match tokio::time::timeout(SHUTDOWN_GRACE, session).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // Most likely blocked on a line prompt, which can't be interrupted.
                    error!("Session did not stop in time");
                    logging::shutdown();
                    std::process::exit(1);
                }
            }
        }
    };

    match outcome.wrap_err("The session panicked")?? {
        Some(summary) => info!(
            sent = summary.sent,
            partial = summary.partial,
            failed = summary.failed,
            "Session done"
        ),
        None => info!("Session ended before a port was opened"),
    }

    logging::shutdown();

    Ok(())
}
