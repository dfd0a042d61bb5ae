use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::backend::BackendKind;
use crate::config::settings::ConfigError;

/// Errors that can occur while building or reading a fixture repository
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Target directory already exists: {}", .0.display())]
    Precondition(PathBuf),

    #[error("Command failed: {0}")]
    Execution(String),

    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("Step '{step}' is not supported by {backend}")]
    UnsupportedStep { backend: BackendKind, step: String },

    #[error("Failed to parse log output: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Top-level application error that wraps all module-specific errors
///
/// All module errors convert to AppError via the `From` trait, so the
/// pipeline and the binary can use `?` across module boundaries.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("VCS error: {0}")]
    Vcs(#[from] VcsError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Build task for {backend} did not complete: {reason}")]
    Join { backend: BackendKind, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for repository operations
pub type VcsResult<T> = std::result::Result<T, VcsError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
