// containerdbtool/src/restore/stage.rs
use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::container::{ContainerRef, Docker};
use crate::errors::{AppError, NotFoundKind, Result};

/// A backup file on the host and where it lands inside the container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub local_path: PathBuf,
    pub remote_staged_path: String,
}

impl BackupArtifact {
    /// Derives the staged path from the file's base name. A trailing `.gz`
    /// is dropped because compressed artifacts are staged decompressed.
    pub fn new(local_path: &Path, staging_dir: &str) -> Result<Self> {
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| AppError::NotFound {
                kind: NotFoundKind::BackupFile,
                name: local_path.display().to_string(),
            })?;
        let staged_name = file_name
            .strip_suffix(".gz")
            .filter(|s| !s.is_empty())
            .unwrap_or(&file_name);
        Ok(Self {
            local_path: local_path.to_path_buf(),
            remote_staged_path: format!("{}/{}", staging_dir.trim_end_matches('/'), staged_name),
        })
    }

    pub fn is_compressed(&self) -> bool {
        self.local_path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
    }
}

/// Fails with `NotFound` unless `path` is an existing regular file.
pub fn ensure_local_file(path: &Path) -> Result<()> {
    if path.is_file() {
        Ok(())
    } else {
        Err(AppError::NotFound {
            kind: NotFoundKind::BackupFile,
            name: path.display().to_string(),
        })
    }
}

/// Copies the backup file into the container's staging directory.
///
/// Any file already at the staged path is overwritten.
pub async fn stage(
    docker: &Docker,
    local_path: &Path,
    container: &ContainerRef,
    staging_dir: &str,
) -> Result<BackupArtifact> {
    ensure_local_file(local_path)?;
    let artifact = BackupArtifact::new(local_path, staging_dir)?;

    if docker.inspect_running(&container.id).await?.is_none() {
        return Err(AppError::NotFound {
            kind: NotFoundKind::Container,
            name: container.name.clone(),
        });
    }

    if artifact.is_compressed() {
        // Keep the temp file alive until docker cp has read it.
        let decompressed = decompress_to_temp(local_path.to_path_buf()).await?;
        debug!(temp = %decompressed.path().display(), "decompressed artifact");
        docker
            .copy_into(decompressed.path(), container, &artifact.remote_staged_path)
            .await
            .map_err(|e| match e {
                AppError::Transfer {
                    container, stderr, ..
                } => AppError::Transfer {
                    path: local_path.to_path_buf(),
                    container,
                    stderr,
                },
                other => other,
            })?;
    } else {
        docker
            .copy_into(local_path, container, &artifact.remote_staged_path)
            .await?;
    }

    info!(
        local = %artifact.local_path.display(),
        remote = %artifact.remote_staged_path,
        container = %container.name,
        "staged backup artifact"
    );
    Ok(artifact)
}

async fn decompress_to_temp(source: PathBuf) -> Result<NamedTempFile> {
    tokio::task::spawn_blocking(move || -> io::Result<NamedTempFile> {
        let mut decoder = GzDecoder::new(BufReader::new(File::open(&source)?));
        let mut temp = tempfile::Builder::new()
            .prefix("containerdbtool_")
            .suffix(".sql")
            .tempfile()?;
        io::copy(&mut decoder, temp.as_file_mut())?;
        Ok(temp)
    })
    .await
    .map_err(|e| AppError::Io(io::Error::other(e)))?
    .map_err(AppError::Io)
}
