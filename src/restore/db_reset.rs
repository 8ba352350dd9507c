// containerdbtool/src/restore/db_reset.rs
use tracing::{info, warn};

use crate::config::RestoreOptions;
use crate::errors::{AppError, Result};
use crate::utils::psql::{Psql, stderr_of};
use crate::utils::{quote_ident, quote_literal};

/// Result of the drop step. A drop that was attempted and failed is an
/// error (`AppError::DropFailed`), never `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropOutcome {
    Dropped,
    Absent,
}

pub async fn database_exists(psql: &Psql, maintenance_db: &str, database: &str) -> Result<bool> {
    let sql = format!(
        "SELECT 1 FROM pg_database WHERE datname = {}",
        quote_literal(database)
    );
    let output = psql.run_sql(maintenance_db, &sql).await?;
    if !output.status.success() {
        return Err(AppError::DropFailed {
            database: database.to_string(),
            stderr: format!("could not check whether the database exists: {}", stderr_of(&output)),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim() == "1")
}

/// Drops `database` if it exists.
pub async fn drop_database(
    psql: &Psql,
    maintenance_db: &str,
    database: &str,
    options: &RestoreOptions,
) -> Result<DropOutcome> {
    if !database_exists(psql, maintenance_db, database).await? {
        info!(database, "database does not exist, nothing to drop");
        return Ok(DropOutcome::Absent);
    }

    if options.terminate_connections {
        let sql = format!(
            "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = {} AND pid <> pg_backend_pid()",
            quote_literal(database)
        );
        let output = psql.run_sql(maintenance_db, &sql).await?;
        if !output.status.success() {
            // The drop below reports the real failure if sessions remain.
            warn!(database, stderr = %stderr_of(&output), "failed to terminate open connections");
        }
    }

    let sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(database));
    let output = psql.run_sql(maintenance_db, &sql).await?;
    if !output.status.success() {
        return Err(AppError::DropFailed {
            database: database.to_string(),
            stderr: stderr_of(&output),
        });
    }
    info!(database, "dropped database");
    Ok(DropOutcome::Dropped)
}

pub async fn create_database(psql: &Psql, maintenance_db: &str, database: &str) -> Result<()> {
    let sql = format!("CREATE DATABASE {}", quote_ident(database));
    let output = psql.run_sql(maintenance_db, &sql).await?;
    if !output.status.success() {
        return Err(AppError::CreateFailed {
            database: database.to_string(),
            stderr: stderr_of(&output),
        });
    }
    info!(database, "created database");
    Ok(())
}

/// Drops (if present) and recreates `database`, leaving it empty.
///
/// Safe to repeat: a run interrupted between drop and create simply finds
/// the database absent next time.
pub async fn reset_database(
    psql: &Psql,
    maintenance_db: &str,
    database: &str,
    options: &RestoreOptions,
) -> Result<DropOutcome> {
    if database.eq_ignore_ascii_case(maintenance_db) {
        return Err(AppError::InvalidInput(format!(
            "refusing to reset '{}': it is the maintenance database used for DROP/CREATE",
            database
        )));
    }
    let dropped = drop_database(psql, maintenance_db, database, options).await?;
    create_database(psql, maintenance_db, database).await?;
    Ok(dropped)
}
