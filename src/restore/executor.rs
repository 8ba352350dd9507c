// containerdbtool/src/restore/executor.rs
//! Applies a staged artifact while sampling the database size.
//!
//! The apply runs as a `docker exec ... psql -f` child process. A separate
//! sampler task queries `pg_database_size` on a fixed interval and sends the
//! samples back over a channel. The executor selects over child exit,
//! cancellation and incoming samples; the sampler is stopped as soon as the
//! child has exited. Samples are advisory and never decide the outcome.

use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::Child;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::stage::BackupArtifact;
use crate::errors::{AppError, Result};
use crate::utils::psql::Psql;

/// How the apply subprocess ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Success,
    /// Nonzero exit; `code` is `None` when the process died from a signal.
    Failed { code: Option<i32> },
    Cancelled,
}

impl RestoreOutcome {
    fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            RestoreOutcome::Success
        } else {
            RestoreOutcome::Failed {
                code: status.code(),
            }
        }
    }
}

/// One heartbeat sample taken while the restore is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreProgress {
    pub elapsed: Duration,
    pub database_size_bytes: i64,
}

#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    pub maintenance_database: String,
    pub poll_interval: Duration,
    pub stop_on_error: bool,
}

pub async fn restore<F>(
    psql: &Psql,
    database: &str,
    artifact: &BackupArtifact,
    settings: &ExecutorSettings,
    cancel: &CancellationToken,
    mut on_progress: F,
) -> Result<RestoreOutcome>
where
    F: FnMut(&RestoreProgress),
{
    if cancel.is_cancelled() {
        info!(database, "cancelled before the apply started");
        return Ok(RestoreOutcome::Cancelled);
    }

    let mut child = psql.spawn_file(database, &artifact.remote_staged_path, settings.stop_on_error)?;
    info!(database, artifact = %artifact.remote_staged_path, "restore started");

    let sampler_stop = cancel.child_token();
    let (tx, mut rx) = mpsc::channel(4);
    let sampler = tokio::spawn(sample_database_size(
        psql.clone(),
        settings.maintenance_database.clone(),
        database.to_string(),
        settings.poll_interval,
        sampler_stop.clone(),
        tx,
    ));

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                terminate(&mut child).await;
                break Ok(RestoreOutcome::Cancelled);
            }
            status = child.wait() => {
                break status.map(RestoreOutcome::from_status);
            }
            Some(progress) = rx.recv() => on_progress(&progress),
        }
    };

    sampler_stop.cancel();
    if let Err(e) = sampler.await {
        warn!(error = %e, "size sampler task ended abnormally");
    }

    let outcome = outcome?;
    info!(database, ?outcome, "restore finished");
    Ok(outcome)
}

/// Samples `pg_database_size(database)` every `period` until stopped.
///
/// The first sample is taken one full period after start.
async fn sample_database_size(
    psql: Psql,
    maintenance_db: String,
    database: String,
    period: Duration,
    stop: CancellationToken,
    tx: mpsc::Sender<RestoreProgress>,
) {
    let started = Instant::now();
    let mut ticker = interval_at(started + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = stop.cancelled() => return,
            _ = ticker.tick() => {}
        }
        let sample = tokio::select! {
            _ = stop.cancelled() => return,
            sample = psql.database_size(&maintenance_db, &database) => sample,
        };
        match sample {
            Ok(bytes) => {
                let progress = RestoreProgress {
                    elapsed: started.elapsed(),
                    database_size_bytes: bytes,
                };
                if tx.send(progress).await.is_err() {
                    return;
                }
            }
            Err(e) => debug!(error = %e, "size sample failed, skipping"),
        }
    }
}

/// Asks the apply process to stop with SIGTERM and waits for it to exit.
/// SIGKILL is used only when SIGTERM could not be delivered.
async fn terminate(child: &mut Child) {
    let Some(pid) = child.id() else {
        return;
    };
    info!(pid, "sending SIGTERM to restore process");
    match send_sigterm(pid).await {
        Ok(()) => {
            if let Err(e) = child.wait().await {
                warn!(pid, error = %e, "failed to wait for terminated restore process");
            }
        }
        Err(e) => {
            warn!(pid, error = %e, "failed to send SIGTERM to restore process, killing it");
            force_kill(child).await;
        }
    }
}

async fn force_kill(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        warn!(error = %e, "failed to kill restore process; it may still be running");
        return;
    }
    if let Err(e) = child.wait().await {
        warn!(error = %e, "failed to wait for killed restore process; it may still be running");
    }
}

async fn send_sigterm(pid: u32) -> Result<()> {
    let status = tokio::process::Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .await?;
    if !status.success() {
        return Err(AppError::Command {
            command: format!("kill -TERM {}", pid),
            stderr: format!("exited with {:?}", status.code()),
        });
    }
    Ok(())
}
