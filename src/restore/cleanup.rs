// containerdbtool/src/restore/cleanup.rs
use tracing::info;

use super::stage::BackupArtifact;
use crate::container::{ContainerRef, Docker};
use crate::errors::{AppError, Result};

/// Removes the staged artifact from the container.
///
/// Every failure, including a container that has stopped or vanished, is
/// reported as `CleanupFailed` so the caller can log it without affecting
/// the restore outcome.
pub async fn cleanup(docker: &Docker, container: &ContainerRef, artifact: &BackupArtifact) -> Result<()> {
    docker
        .remove_file(container, &artifact.remote_staged_path)
        .await
        .map_err(|e| AppError::CleanupFailed {
            path: artifact.remote_staged_path.clone(),
            reason: match e {
                AppError::Command { stderr, .. } => stderr,
                other => other.to_string(),
            },
        })?;
    info!(path = %artifact.remote_staged_path, container = %container.name, "removed staged artifact");
    Ok(())
}
