// containerdbtool/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::container::docker::find_docker_executable;

pub const DEFAULT_CONFIG_FILE: &str = "config.json";
pub const DEFAULT_CONTAINER: &str = "base-setup-postgres-1";
const DEFAULT_CONTAINER_FILTER: &str = "postgres";
const DEFAULT_POSTGRES_USER: &str = "postgres";
const DEFAULT_MAINTENANCE_DATABASE: &str = "postgres";
const DEFAULT_STAGING_DIR: &str = "/";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

const ENV_DOCKER: &str = "CONTAINERDBTOOL_DOCKER";
const ENV_DEFAULT_CONTAINER: &str = "CONTAINERDBTOOL_DEFAULT_CONTAINER";
const ENV_CONTAINER_FILTER: &str = "CONTAINERDBTOOL_CONTAINER_FILTER";
const ENV_POSTGRES_USER: &str = "CONTAINERDBTOOL_POSTGRES_USER";
const ENV_POLL_INTERVAL_SECS: &str = "CONTAINERDBTOOL_POLL_INTERVAL_SECS";

// Structs for deserializing config.json
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JsonRestoreOptions {
    pub terminate_connections: Option<bool>,
    pub stop_on_error: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawJsonConfig {
    pub docker_path: Option<PathBuf>,
    pub default_container: Option<String>,
    pub container_filter: Option<String>,
    pub postgres_user: Option<String>,
    pub maintenance_database: Option<String>,
    pub staging_dir: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub restore_options: Option<JsonRestoreOptions>,
}

// Application's internal configuration structs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Terminate other sessions on the target database before dropping it.
    pub terminate_connections: bool,
    /// Run the artifact with `ON_ERROR_STOP=1` so a failing statement fails the restore.
    pub stop_on_error: bool,
}

impl Default for RestoreOptions {
    fn default() -> Self {
        Self {
            terminate_connections: false,
            stop_on_error: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Explicit docker binary; `None` means look it up in PATH.
    pub docker_path: Option<PathBuf>,
    /// Container the restore tool uses when none is given on the command line.
    pub default_container: String,
    /// Image substring the query tool uses to discover containers.
    pub container_filter: String,
    pub postgres_user: String,
    /// Database used for DROP/CREATE and size sampling.
    pub maintenance_database: String,
    /// Directory inside the container where artifacts are staged.
    pub staging_dir: String,
    pub poll_interval: Duration,
    pub restore_options: RestoreOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from_raw(RawJsonConfig::default())
    }
}

impl AppConfig {
    /// Loads configuration from `config_path`.
    ///
    /// When `required` is false a missing file yields the defaults, which is
    /// how the implicit `config.json` in the working directory is treated.
    pub fn load(config_path: &Path, required: bool) -> Result<Self> {
        if !config_path.exists() && !required {
            return Ok(Self::default());
        }
        Self::load_from_json(config_path)
    }

    pub fn load_from_json(config_path: &Path) -> Result<Self> {
        let config_content = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
        let raw_json_config: RawJsonConfig =
            serde_json::from_str(&config_content).with_context(|| {
                format!(
                    "Failed to parse JSON from config file at {}",
                    config_path.display()
                )
            })?;
        let config = Self::from_raw(raw_json_config);
        config.validate()?;
        Ok(config)
    }

    fn from_raw(raw: RawJsonConfig) -> Self {
        let restore_opts = raw.restore_options.unwrap_or_default();
        let defaults = RestoreOptions::default();
        AppConfig {
            docker_path: raw.docker_path,
            default_container: non_empty(raw.default_container)
                .unwrap_or_else(|| DEFAULT_CONTAINER.to_string()),
            container_filter: non_empty(raw.container_filter)
                .unwrap_or_else(|| DEFAULT_CONTAINER_FILTER.to_string()),
            postgres_user: non_empty(raw.postgres_user)
                .unwrap_or_else(|| DEFAULT_POSTGRES_USER.to_string()),
            maintenance_database: non_empty(raw.maintenance_database)
                .unwrap_or_else(|| DEFAULT_MAINTENANCE_DATABASE.to_string()),
            staging_dir: non_empty(raw.staging_dir)
                .unwrap_or_else(|| DEFAULT_STAGING_DIR.to_string()),
            poll_interval: Duration::from_secs(
                raw.poll_interval_secs.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            restore_options: RestoreOptions {
                terminate_connections: restore_opts
                    .terminate_connections
                    .unwrap_or(defaults.terminate_connections),
                stop_on_error: restore_opts.stop_on_error.unwrap_or(defaults.stop_on_error),
            },
        }
    }

    /// Applies `CONTAINERDBTOOL_*` overrides. `lookup` is `std::env::var` in
    /// production.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(docker) = var(ENV_DOCKER) {
            self.docker_path = Some(PathBuf::from(docker));
        }
        if let Some(container) = var(ENV_DEFAULT_CONTAINER) {
            self.default_container = container;
        }
        if let Some(filter) = var(ENV_CONTAINER_FILTER) {
            self.container_filter = filter;
        }
        if let Some(user) = var(ENV_POSTGRES_USER) {
            self.postgres_user = user;
        }
        if let Some(secs) = var(ENV_POLL_INTERVAL_SECS) {
            let secs: u64 = secs.trim().parse().with_context(|| {
                format!("{} must be a whole number of seconds, got '{}'", ENV_POLL_INTERVAL_SECS, secs)
            })?;
            self.poll_interval = Duration::from_secs(secs);
        }
        self.validate()
    }

    fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval_secs must be greater than zero");
        }
        if !self.staging_dir.starts_with('/') {
            anyhow::bail!(
                "staging_dir must be an absolute path inside the container, got '{}'",
                self.staging_dir
            );
        }
        Ok(())
    }

    /// The docker binary to run: the configured one, or `docker` from PATH.
    pub fn resolve_docker_path(&self) -> Result<PathBuf> {
        match &self.docker_path {
            Some(path) => Ok(path.clone()),
            None => find_docker_executable(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
