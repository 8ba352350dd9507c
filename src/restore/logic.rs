// containerdbtool/src/restore/logic.rs
use chrono::{DateTime, Local};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::RestoreRequest;
use super::cleanup::cleanup;
use super::db_reset::{DropOutcome, reset_database};
use super::executor::{self, ExecutorSettings, RestoreOutcome};
use super::stage::{self, BackupArtifact};
use super::verification::{VerificationSummary, verify_restore};
use crate::config::AppConfig;
use crate::container::locator::locate_explicit;
use crate::container::{ContainerRef, Docker};
use crate::errors::{AppError, Result};
use crate::output;
use crate::utils::psql::Psql;
use crate::utils::validate_database_name;

/// Summary of a successful restore.
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub container: ContainerRef,
    pub artifact: BackupArtifact,
    pub database: String,
    pub drop_outcome: DropOutcome,
    pub started_at: DateTime<Local>,
    pub elapsed: std::time::Duration,
    /// `false` when the staged artifact could not be removed.
    pub cleaned_up: bool,
    /// `None` when the post-restore check itself failed.
    pub verification: Option<VerificationSummary>,
}

/// Orchestrates the restore:
/// 1. Validates the database name and the local backup file.
/// 2. Resolves the container (explicit or configured default).
/// 3. Stages the artifact into the container.
/// 4. Drops and recreates the target database.
/// 5. Applies the artifact, printing size heartbeats.
/// 6. On success removes the staged artifact and verifies the result.
///
/// Every step is fail-fast. Cancellation is honoured between steps, so a
/// cancel requested while locating or staging never reaches the database.
/// After a failed or cancelled apply the staged artifact is left in the
/// container for inspection.
pub async fn perform_restore_orchestration(
    app_config: &AppConfig,
    docker: &Docker,
    request: &RestoreRequest,
    cancel: &CancellationToken,
) -> Result<RestoreReport> {
    let database = request.database.as_str();
    validate_database_name(database)?;
    stage::ensure_local_file(&request.backup_file)?;

    output::step("Locating container");
    let container = locate_explicit(
        docker,
        request.container.as_deref(),
        &app_config.default_container,
    )
    .await?;
    output::kv("container", &container.to_string());
    if cancel.is_cancelled() {
        return Err(cancelled(database, "before staging"));
    }

    output::step("Staging backup");
    let artifact = stage::stage(
        docker,
        &request.backup_file,
        &container,
        &app_config.staging_dir,
    )
    .await?;
    output::kv(
        "staged",
        &format!("{} -> {}", artifact.local_path.display(), artifact.remote_staged_path),
    );

    if cancel.is_cancelled() {
        preserve_artifact(&container, &artifact);
        return Err(cancelled(database, "before the database was reset"));
    }

    let psql = Psql::new(docker.clone(), container.clone(), &app_config.postgres_user);

    output::step(&format!("Recreating database '{}'", database));
    let drop_outcome = reset_database(
        &psql,
        &app_config.maintenance_database,
        database,
        &app_config.restore_options,
    )
    .await?;
    output::kv(
        "previous database",
        match drop_outcome {
            DropOutcome::Dropped => "dropped",
            DropOutcome::Absent => "did not exist",
        },
    );

    let started_at = Local::now();
    let clock = Instant::now();
    output::step(&format!(
        "Restoring into '{}' (started {})",
        database,
        started_at.format("%Y-%m-%d %H:%M:%S")
    ));
    let settings = ExecutorSettings {
        maintenance_database: app_config.maintenance_database.clone(),
        poll_interval: app_config.poll_interval,
        stop_on_error: app_config.restore_options.stop_on_error,
    };
    let outcome =
        executor::restore(&psql, database, &artifact, &settings, cancel, output::progress).await?;

    match outcome {
        RestoreOutcome::Success => {}
        RestoreOutcome::Failed { code } => {
            preserve_artifact(&container, &artifact);
            return Err(AppError::RestoreFailed {
                database: database.to_string(),
                code,
            });
        }
        RestoreOutcome::Cancelled => {
            preserve_artifact(&container, &artifact);
            return Err(AppError::Cancelled(format!(
                "restore into '{}' was interrupted",
                database
            )));
        }
    }
    let elapsed = clock.elapsed();
    info!(database, ?elapsed, "restore applied");

    output::step("Cleaning up");
    let cleaned_up = match cleanup(docker, &container, &artifact).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "cleanup failed; restore result is unaffected");
            output::warning(&e.to_string());
            false
        }
    };

    let verification = match verify_restore(&psql, database).await {
        Ok(summary) => {
            if summary.table_count == 0 {
                output::warning(&format!(
                    "No tables found in the public schema of '{}'. The backup may not target the public schema.",
                    database
                ));
            } else {
                output::kv("tables in public schema", &summary.table_count.to_string());
            }
            Some(summary)
        }
        Err(e) => {
            warn!(error = %e, "post-restore verification failed");
            None
        }
    };

    Ok(RestoreReport {
        container,
        artifact,
        database: database.to_string(),
        drop_outcome,
        started_at,
        elapsed,
        cleaned_up,
        verification,
    })
}

fn cancelled(database: &str, when: &str) -> AppError {
    info!(database, when, "restore cancelled");
    AppError::Cancelled(format!("restore into '{}' was interrupted {}", database, when))
}

fn preserve_artifact(container: &ContainerRef, artifact: &BackupArtifact) {
    warn!(path = %artifact.remote_staged_path, "leaving staged artifact in place");
    output::warning(&format!(
        "Staged artifact kept at {}:{} for inspection",
        container.name, artifact.remote_staged_path
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::NotFoundKind;
    use crate::test_support::FakeDocker;
    use std::path::Path;
    use std::time::Duration;

    /// A running `pg` container whose psql keeps state in files next to the
    /// script. `apply_exit` is the exit code of `psql -f`, `rm_exit` the exit
    /// code of the cleanup `rm`.
    fn docker_script(apply_exit: i32, rm_exit: i32) -> String {
        docker_script_with_apply(
            &format!(
                r#"[ {apply_exit} -ne 0 ] && exit {apply_exit}
        grep -c INSERT "$dir/staged.sql" > "$dir/rows""#
            ),
            rm_exit,
        )
    }

    /// Same container, with `apply` as the shell run for `psql -f`.
    fn docker_script_with_apply(apply: &str, rm_exit: i32) -> String {
        format!(
            r#"dir="$(dirname "$0")"
for last; do :; done
case "$1" in
  inspect)
    echo '[{{"Id":"pg-id","Name":"/pg","Config":{{"Image":"postgres:16"}},"State":{{"Status":"running","Running":true}}}}]'
    ;;
  cp)
    cp "$2" "$dir/staged.sql"
    ;;
  exec)
    [ "$3" = rm ] && exit {rm_exit}
    case "$last" in
      /*.sql)
        {apply}
        ;;
      *"pg_tables"*) echo t ;;
      *"FROM pg_database"*) [ -f "$dir/db" ] && echo 1 ;;
      DROP*) rm -f "$dir/db" ;;
      CREATE*) touch "$dir/db" ;;
    esac
    ;;
esac
exit 0"#
        )
    }

    fn config() -> AppConfig {
        AppConfig {
            poll_interval: Duration::from_millis(50),
            ..AppConfig::default()
        }
    }

    fn request(fake: &FakeDocker) -> anyhow::Result<RestoreRequest> {
        let backup_file = fake.dir().join("backup.sql");
        std::fs::write(
            &backup_file,
            "CREATE TABLE t(x int);\nINSERT INTO t VALUES (1);\nINSERT INTO t VALUES (2);\nINSERT INTO t VALUES (3);\n",
        )?;
        Ok(RestoreRequest {
            backup_file,
            container: None,
            database: "testdb".to_string(),
        })
    }

    #[tokio::test]
    async fn test_full_restore_flow() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(0, 0))?;
        let request = request(&fake)?;

        let report = perform_restore_orchestration(
            &config(),
            &fake.docker(),
            &request,
            &CancellationToken::new(),
        )
        .await?;

        assert_eq!(report.container.name, "pg");
        assert_eq!(report.artifact.remote_staged_path, "/backup.sql");
        assert_eq!(report.drop_outcome, DropOutcome::Absent);
        assert!(report.cleaned_up);
        assert_eq!(report.verification.map(|v| v.table_count), Some(1));
        assert_eq!(std::fs::read_to_string(fake.dir().join("rows"))?.trim(), "3");

        let calls = fake.calls()?;
        assert!(calls[0].ends_with("base-setup-postgres-1"), "default container used");
        assert!(calls.iter().any(|c| c == "exec pg-id rm -f /backup.sql"));
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_restore_keeps_artifact() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(3, 0))?;
        let request = request(&fake)?;

        let err = perform_restore_orchestration(
            &config(),
            &fake.docker(),
            &request,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::RestoreFailed {
                code: Some(3),
                ..
            }
        ));
        assert!(!fake.calls()?.iter().any(|c| c.contains(" rm -f ")));
        Ok(())
    }

    #[tokio::test]
    async fn test_cleanup_failure_keeps_success() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(0, 1))?;
        let request = request(&fake)?;

        let report = perform_restore_orchestration(
            &config(),
            &fake.docker(),
            &request,
            &CancellationToken::new(),
        )
        .await?;

        assert!(!report.cleaned_up);
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_backup_file_stops_before_docker() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(0, 0))?;
        let request = RestoreRequest {
            backup_file: Path::new("/definitely/not/here.sql").to_path_buf(),
            container: Some("pg".to_string()),
            database: "testdb".to_string(),
        };

        let err = perform_restore_orchestration(
            &config(),
            &fake.docker(),
            &request,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            AppError::NotFound {
                kind: NotFoundKind::BackupFile,
                ..
            }
        ));
        assert!(fake.calls()?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_database_name_is_rejected() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(0, 0))?;
        let mut request = request(&fake)?;
        request.database = "bad name; DROP".to_string();

        let err = perform_restore_orchestration(
            &config(),
            &fake.docker(),
            &request,
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        Ok(())
    }

    fn database_calls(calls: &[String]) -> Vec<&String> {
        calls
            .iter()
            .filter(|c| c.contains("DROP") || c.contains("CREATE DATABASE") || c.contains(" -f "))
            .collect()
    }

    #[tokio::test]
    async fn test_cancel_before_reset_leaves_database_untouched() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script(0, 0))?;
        let request = request(&fake)?;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = perform_restore_orchestration(&config(), &fake.docker(), &request, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled(_)));
        let calls = fake.calls()?;
        assert!(database_calls(&calls).is_empty(), "database touched: {calls:?}");
        assert!(!calls.iter().any(|c| c.starts_with("cp ")));
        Ok(())
    }

    #[tokio::test]
    async fn test_cancel_during_apply_keeps_artifact() -> anyhow::Result<()> {
        let fake = FakeDocker::new(&docker_script_with_apply(
            r#"touch "$dir/applying"; exec sleep 30"#,
            0,
        ))?;
        let request = request(&fake)?;
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let marker = fake.dir().join("applying");
        tokio::spawn(async move {
            while !marker.exists() {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            trigger.cancel();
        });

        let err = tokio::time::timeout(
            Duration::from_secs(20),
            perform_restore_orchestration(&config(), &fake.docker(), &request, &cancel),
        )
        .await?
        .unwrap_err();

        assert!(matches!(err, AppError::Cancelled(_)));
        let calls = fake.calls()?;
        assert!(calls.iter().any(|c| c.ends_with("-f /backup.sql")));
        assert!(!calls.iter().any(|c| c.contains(" rm -f ")));
        Ok(())
    }
}
