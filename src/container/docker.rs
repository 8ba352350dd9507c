// containerdbtool/src/container/docker.rs
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use anyhow::Context;
use serde::Deserialize;
use tokio::process::Command;
use tracing::debug;
use which::which;

use super::ContainerRef;
use crate::errors::{AppError, Result};

/// Finds the docker executable in the system PATH.
pub fn find_docker_executable() -> anyhow::Result<PathBuf> {
    which("docker").context(
        "docker executable not found in PATH. Please ensure the Docker CLI is installed and in your PATH.",
    )
}

/// Thin wrapper over the `docker` command-line client.
///
/// Every operation is a single subprocess call; nothing is cached between
/// calls.
#[derive(Debug, Clone)]
pub struct Docker {
    program: PathBuf,
}

/// One line of `docker ps --format '{{json .}}'`.
#[derive(Debug, Deserialize)]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "Image")]
    image: String,
    #[serde(rename = "Status", default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct InspectEntry {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Config")]
    config: InspectConfig,
    #[serde(rename = "State")]
    state: InspectState,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Image")]
    image: String,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status")]
    status: String,
    #[serde(rename = "Running")]
    running: bool,
}

impl Docker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// A `docker <args>` command that has not been spawned yet.
    pub fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        cmd
    }

    /// `docker exec <container> <args>`, not spawned yet.
    pub fn exec_command(&self, container: &ContainerRef, args: &[&str]) -> Command {
        let mut cmd = self.command(["exec", container.id.as_str()]);
        cmd.args(args);
        cmd
    }

    /// Runs `docker <args>` to completion with captured output.
    ///
    /// A nonzero exit status is not an error here; callers decide what a
    /// failure means for their stage. Only a failure to spawn is reported.
    pub async fn output(&self, args: &[&str]) -> Result<Output> {
        debug!(program = %self.program.display(), ?args, "running docker");
        self.command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| AppError::Command {
                command: format!("docker {}", args.join(" ")),
                stderr: e.to_string(),
            })
    }

    /// Runs `docker exec <container> <args>` to completion with captured output.
    pub async fn exec_output(&self, container: &ContainerRef, args: &[&str]) -> Result<Output> {
        let mut full = vec!["exec", container.id.as_str()];
        full.extend_from_slice(args);
        self.output(&full).await
    }

    /// Lists every running container.
    pub async fn list_running(&self) -> Result<Vec<ContainerRef>> {
        let output = self.output(&["ps", "--no-trunc", "--format", "{{json .}}"]).await?;
        if !output.status.success() {
            return Err(AppError::Command {
                command: "docker ps".to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        parse_ps_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Inspects one container by name or id.
    ///
    /// Returns `None` when the container does not exist or is not running.
    pub async fn inspect_running(&self, name_or_id: &str) -> Result<Option<ContainerRef>> {
        let output = self
            .output(&["inspect", "--type", "container", name_or_id])
            .await?;
        if !output.status.success() {
            debug!(
                container = name_or_id,
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "docker inspect failed, treating container as absent"
            );
            return Ok(None);
        }
        parse_inspect_output(&String::from_utf8_lossy(&output.stdout))
    }

    /// Copies a host file to `remote_path` inside the container, overwriting
    /// anything already there.
    pub async fn copy_into(
        &self,
        local: &Path,
        container: &ContainerRef,
        remote_path: &str,
    ) -> Result<()> {
        let destination = format!("{}:{}", container.id, remote_path);
        let local_arg = local.to_string_lossy();
        let output = self.output(&["cp", &local_arg, &destination]).await?;
        if !output.status.success() {
            return Err(AppError::Transfer {
                path: local.to_path_buf(),
                container: container.name.clone(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }

    /// Removes a file inside the container (`rm -f`).
    pub async fn remove_file(&self, container: &ContainerRef, remote_path: &str) -> Result<()> {
        let output = self.exec_output(container, &["rm", "-f", remote_path]).await?;
        if !output.status.success() {
            return Err(AppError::Command {
                command: format!("docker exec {} rm -f {}", container.name, remote_path),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

/// Parses the JSON-lines output of `docker ps --format '{{json .}}'`.
fn parse_ps_output(stdout: &str) -> Result<Vec<ContainerRef>> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let entry: PsLine = serde_json::from_str(line)?;
            Ok(ContainerRef {
                id: entry.id,
                // `Names` is comma separated when a container has aliases.
                name: entry
                    .names
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .to_string(),
                image: entry.image,
                status: entry.status,
            })
        })
        .collect()
}

fn parse_inspect_output(stdout: &str) -> Result<Option<ContainerRef>> {
    let entries: Vec<InspectEntry> = serde_json::from_str(stdout)?;
    Ok(entries
        .into_iter()
        .find(|entry| entry.state.running)
        .map(|entry| ContainerRef {
            id: entry.id,
            name: entry.name.trim_start_matches('/').to_string(),
            image: entry.config.image,
            status: entry.state.status,
        }))
}
