//! Container Database Tool
//!
//! Restores SQL backups into PostgreSQL containers and runs one-off queries
//! against them, driving the `docker` CLI.

// containerdbtool/src/main.rs
mod cli;
mod config;
mod container;
mod errors;
mod output;
mod query;
mod restore;
mod utils;

#[cfg(test)]
mod test_support;

use clap::Parser;
use clap::error::ErrorKind;
use dotenv::dotenv;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use cli::{Cli, Commands, parse_query_args, parse_restore_args};
use config::AppConfig;
use errors::AppError;

/// Main entry point for the container database tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => {
                    output::usage();
                    ExitCode::FAILURE
                }
            };
        }
    };

    init_tracing(cli.verbose);

    let Some(command) = &cli.command else {
        output::usage();
        return ExitCode::FAILURE;
    };

    let app_config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            output::error("config", &format!("{:#}", e));
            return ExitCode::FAILURE;
        }
    };

    match command {
        Commands::Restore { args } => {
            let Ok(request) = parse_restore_args(args) else {
                output::usage();
                return ExitCode::FAILURE;
            };
            output::info(&format!(
                "Restoring {} into database '{}'",
                request.backup_file.display(),
                request.database
            ));
            let cancel = CancellationToken::new();
            spawn_signal_forwarder(cancel.clone());

            match restore::run_restore_flow(&app_config, &request, &cancel).await {
                Ok(report) => {
                    output::success(&format!(
                        "Restored '{}' into '{}' on {} in {:.1?}",
                        report.artifact.local_path.display(),
                        report.database,
                        report.container.name,
                        report.elapsed
                    ));
                    info!(
                        started_at = %report.started_at.to_rfc3339(),
                        cleaned_up = report.cleaned_up,
                        tables = ?report.verification.as_ref().map(|v| &v.tables),
                        "restore complete"
                    );
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    report_error(&e);
                    ExitCode::FAILURE
                }
            }
        }
        Commands::Query { args } => {
            let Ok(request) = parse_query_args(args) else {
                output::usage();
                return ExitCode::FAILURE;
            };
            match query::run_query_flow(&app_config, &request).await {
                Ok(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
                Err(e) => {
                    report_error(&e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let (config_path, required) = cli.config_path();
    let mut app_config = AppConfig::load(&config_path, required)?;
    app_config.apply_env_overrides(|key| std::env::var(key).ok())?;
    Ok(app_config)
}

fn report_error(e: &AppError) {
    if let AppError::Ambiguous { candidates, .. } = e {
        output::candidates(candidates);
    }
    output::error(e.stage(), &format!("{:#}", e));
}

/// Cancels `cancel` on Ctrl-C or SIGTERM so a running restore can stop its
/// psql child.
fn spawn_signal_forwarder(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(err) => {
                    warn!("failed to register SIGTERM handler: {err:#}");
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                    return;
                }
            };

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {},
                _ = sigterm.recv() => {},
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }

        warn!("interrupt received, stopping restore");
        cancel.cancel();
    })
}
