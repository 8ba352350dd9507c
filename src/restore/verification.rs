// containerdbtool/src/restore/verification.rs
use crate::errors::{AppError, Result};
use crate::utils::psql::Psql;

/// What was found in the restored database's `public` schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationSummary {
    pub table_count: usize,
    pub tables: Vec<String>,
}

/// Lists the tables in the `public` schema of the restored database.
///
/// This is a basic sanity check; an empty schema is reported, not rejected,
/// because some artifacts legitimately restore nothing into `public`.
pub async fn verify_restore(psql: &Psql, database: &str) -> Result<VerificationSummary> {
    let listing = psql
        .scalar(
            database,
            "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = 'public' ORDER BY tablename",
        )
        .await
        .map_err(|e| match e {
            AppError::Command { stderr, .. } => AppError::Command {
                command: format!("table listing for '{}'", database),
                stderr,
            },
            other => other,
        })?;

    let tables: Vec<String> = listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    Ok(VerificationSummary {
        table_count: tables.len(),
        tables,
    })
}
