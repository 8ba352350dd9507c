use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::container::ContainerRef;

/// What a `NotFound` error was looking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    BackupFile,
    Container,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::BackupFile => write!(f, "Backup file"),
            NotFoundKind::Container => write!(f, "Running container"),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("{kind} not found: {name}")]
    NotFound { kind: NotFoundKind, name: String },

    #[error("{} running containers match '{hint}'; pass a container id to pick one", .candidates.len())]
    Ambiguous {
        hint: String,
        candidates: Vec<ContainerRef>,
    },

    #[error("Failed to copy {} into container {container}: {stderr}", .path.display())]
    Transfer {
        path: PathBuf,
        container: String,
        stderr: String,
    },

    #[error("Failed to drop database '{database}': {stderr}")]
    DropFailed { database: String, stderr: String },

    #[error("Failed to create database '{database}': {stderr}")]
    CreateFailed { database: String, stderr: String },

    #[error("Restore into '{database}' failed ({})", describe_exit(.code))]
    RestoreFailed { database: String, code: Option<i32> },

    #[error("Failed to remove staged artifact {path}: {reason}")]
    CleanupFailed { path: String, reason: String },

    #[error("Command `{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl AppError {
    /// Short label of the pipeline stage the error belongs to, used to prefix
    /// operator-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::NotFound {
                kind: NotFoundKind::BackupFile,
                ..
            } => "stage",
            AppError::NotFound {
                kind: NotFoundKind::Container,
                ..
            }
            | AppError::Ambiguous { .. } => "locate",
            AppError::Transfer { .. } => "stage",
            AppError::DropFailed { .. } | AppError::CreateFailed { .. } => "reset",
            AppError::RestoreFailed { .. } | AppError::Cancelled(_) => "restore",
            AppError::CleanupFailed { .. } => "cleanup",
            AppError::Command { .. } | AppError::SerdeJson(_) => "docker",
            AppError::InvalidInput(_) => "input",
            AppError::Anyhow(_) => "config",
            AppError::Io(_) => "io",
        }
    }
}

/// Renders an optional process exit code; `None` means the process was
/// terminated by a signal.
pub fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {}", code),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
