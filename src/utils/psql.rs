// containerdbtool/src/utils/psql.rs
use std::process::{ExitStatus, Output, Stdio};

use tokio::process::{Child, Command};
use tracing::debug;

use crate::container::{ContainerRef, Docker};
use crate::errors::{AppError, Result};
use crate::utils::quote_literal;

/// `psql` running inside a container through `docker exec`.
#[derive(Debug, Clone)]
pub struct Psql {
    docker: Docker,
    container: ContainerRef,
    user: String,
}

impl Psql {
    pub fn new(docker: Docker, container: ContainerRef, user: impl Into<String>) -> Self {
        Self {
            docker,
            container,
            user: user.into(),
        }
    }

    fn command(&self, database: &str, extra: &[&str]) -> Command {
        let mut args = vec!["psql", "-X", "-U", self.user.as_str(), "-d", database];
        args.extend_from_slice(extra);
        debug!(container = %self.container.name, ?args, "psql");
        self.docker.exec_command(&self.container, &args)
    }

    /// Runs one statement in unaligned, tuples-only mode and captures output.
    pub async fn run_sql(&self, database: &str, sql: &str) -> Result<Output> {
        self.command(database, &["-tA", "-v", "ON_ERROR_STOP=1", "-c", sql])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::Command {
                command: format!("docker exec {} psql -c ...", self.container.name),
                stderr: e.to_string(),
            })
    }

    /// Runs one statement and returns its trimmed stdout, failing on a
    /// nonzero exit.
    pub async fn scalar(&self, database: &str, sql: &str) -> Result<String> {
        let output = self.run_sql(database, sql).await?;
        if !output.status.success() {
            return Err(AppError::Command {
                command: format!("psql -d {} -c {}", database, sql),
                stderr: stderr_of(&output),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Current on-disk size of `database` in bytes.
    pub async fn database_size(&self, maintenance_db: &str, database: &str) -> Result<i64> {
        let sql = format!("SELECT pg_database_size({})", quote_literal(database));
        let value = self.scalar(maintenance_db, &sql).await?;
        value.parse::<i64>().map_err(|e| AppError::Command {
            command: sql,
            stderr: format!("unexpected size value '{}': {}", value, e),
        })
    }

    /// Spawns `psql -f <remote_path>` against `database` without waiting.
    ///
    /// Statement tags are discarded; psql's stderr is passed through so the
    /// operator sees failing statements.
    pub fn spawn_file(&self, database: &str, remote_path: &str, stop_on_error: bool) -> Result<Child> {
        let mut extra = vec!["-q"];
        if stop_on_error {
            extra.extend_from_slice(&["-v", "ON_ERROR_STOP=1"]);
        }
        extra.extend_from_slice(&["-f", remote_path]);
        self.command(database, &extra)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| AppError::Command {
                command: format!("docker exec {} psql -f {}", self.container.name, remote_path),
                stderr: e.to_string(),
            })
    }

    /// Runs `sql` with the terminal attached, so psql's own tabular output
    /// reaches the operator verbatim.
    pub async fn passthrough(&self, database: &str, sql: &str) -> Result<ExitStatus> {
        self.command(database, &["-c", sql])
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| AppError::Command {
                command: format!("docker exec {} psql -c ...", self.container.name),
                stderr: e.to_string(),
            })
    }
}

pub fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeDocker, container};

    #[tokio::test]
    async fn test_database_size_parses_scalar() -> anyhow::Result<()> {
        let fake = FakeDocker::new(r#"echo "  8192 ""#)?;
        let psql = Psql::new(fake.docker(), container("pg"), "postgres");

        assert_eq!(psql.database_size("postgres", "testdb").await?, 8192);
        assert_eq!(
            fake.calls()?,
            vec!["exec pg-id psql -X -U postgres -d postgres -tA -v ON_ERROR_STOP=1 -c SELECT pg_database_size('testdb')"]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_scalar_reports_psql_failure() -> anyhow::Result<()> {
        let fake = FakeDocker::new(r#"echo 'FATAL: role "nobody" does not exist' >&2; exit 2"#)?;
        let psql = Psql::new(fake.docker(), container("pg"), "nobody");

        let err = psql.scalar("postgres", "SELECT 1").await.unwrap_err();
        assert!(matches!(err, AppError::Command { ref stderr, .. } if stderr.contains("nobody")));
        Ok(())
    }

    #[tokio::test]
    async fn test_database_size_rejects_non_numeric() -> anyhow::Result<()> {
        let fake = FakeDocker::new("echo oops")?;
        let psql = Psql::new(fake.docker(), container("pg"), "postgres");
        assert!(psql.database_size("postgres", "testdb").await.is_err());
        Ok(())
    }
}
