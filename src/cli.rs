// containerdbtool/src/cli.rs
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;
use crate::query::QueryRequest;
use crate::restore::RestoreRequest;

#[derive(Parser, Debug)]
#[command(
    name = "containerdbtool",
    about = "Restore SQL backups into, and run queries against, PostgreSQL containers",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Path to config.json
    #[arg(long, global = true, env = "CONTAINERDBTOOL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// restore <backup-file> [container-id] <database-name>
    Restore {
        #[arg(num_args = 0.., allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// query <database_name> <sql_query> [container_id]
    Query {
        #[arg(num_args = 0.., allow_hyphen_values = true, trailing_var_arg = true)]
        args: Vec<String>,
    },
}

impl Cli {
    /// The config file and whether it has to exist. Only an explicitly named
    /// file is required.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }
}

/// Wrong number of positional arguments for a subcommand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError;

/// `restore <backup-file> <database-name>` uses the default container;
/// `restore <backup-file> <container-id> <database-name>` names one.
pub fn parse_restore_args(args: &[String]) -> Result<RestoreRequest, UsageError> {
    match args {
        [backup, database] => Ok(RestoreRequest {
            backup_file: PathBuf::from(backup),
            container: None,
            database: database.clone(),
        }),
        [backup, container, database] => Ok(RestoreRequest {
            backup_file: PathBuf::from(backup),
            container: Some(container.clone()),
            database: database.clone(),
        }),
        _ => Err(UsageError),
    }
}

pub fn parse_query_args(args: &[String]) -> Result<QueryRequest, UsageError> {
    match args {
        [database, sql] => Ok(QueryRequest {
            database: database.clone(),
            sql: sql.clone(),
            container: None,
        }),
        [database, sql, container] => Ok(QueryRequest {
            database: database.clone(),
            sql: sql.clone(),
            container: Some(container.clone()),
        }),
        _ => Err(UsageError),
    }
}
