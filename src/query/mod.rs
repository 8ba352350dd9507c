// containerdbtool/src/query/mod.rs
//! Runs a single SQL statement inside a PostgreSQL container.

use tracing::info;

use crate::config::AppConfig;
use crate::container::locator::{locate_by_hint, locate_explicit};
use crate::container::{ContainerRef, Docker};
use crate::errors::Result;
use crate::utils::psql::Psql;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub database: String,
    pub sql: String,
    /// When `None` the container is found by `container_filter`.
    pub container: Option<String>,
}

/// Public entry point for the query tool. Returns psql's exit code.
pub async fn run_query_flow(app_config: &AppConfig, request: &QueryRequest) -> Result<i32> {
    let docker = Docker::new(app_config.resolve_docker_path()?);
    perform_query(app_config, &docker, request).await
}

/// The database name is passed to `psql -d` as a single argument and is
/// never interpolated into SQL, so any name PostgreSQL accepts is allowed.
pub async fn perform_query(app_config: &AppConfig, docker: &Docker, request: &QueryRequest) -> Result<i32> {
    let container = resolve_container(app_config, docker, request.container.as_deref()).await?;

    let psql = Psql::new(docker.clone(), container, &app_config.postgres_user);
    let status = psql.passthrough(&request.database, &request.sql).await?;
    // A psql killed by a signal has no code; report it as a generic failure.
    let code = status.code().unwrap_or(1);
    info!(database = %request.database, code, "query finished");
    Ok(code)
}

async fn resolve_container(
    app_config: &AppConfig,
    docker: &Docker,
    explicit: Option<&str>,
) -> Result<ContainerRef> {
    match explicit {
        Some(name) => locate_explicit(docker, Some(name), &app_config.default_container).await,
        None => locate_by_hint(docker, Some(&app_config.container_filter)).await,
    }
}
