mod logic;
pub(crate) mod cleanup;
pub(crate) mod db_reset;
pub(crate) mod executor;
pub(crate) mod stage;
pub(crate) mod verification;

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::config::AppConfig;
use crate::container::Docker;
use crate::errors::Result;

pub use logic::RestoreReport;

/// What the operator asked to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub backup_file: PathBuf,
    /// Explicit container name or id; `None` uses the configured default.
    pub container: Option<String>,
    pub database: String,
}

/// Public entry point for the restore process.
pub async fn run_restore_flow(
    app_config: &AppConfig,
    request: &RestoreRequest,
    cancel: &CancellationToken,
) -> Result<RestoreReport> {
    let docker = Docker::new(app_config.resolve_docker_path()?);
    logic::perform_restore_orchestration(app_config, &docker, request, cancel).await
}
