//! Error handling for the blepi CLI

use thiserror::Error;

use crate::config::ConfigError;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("Peripheral error: {0}")]
    Peripheral(#[from] blepi_core::PeripheralError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Dispatch task failed: {0}")]
    Dispatch(#[from] tokio::task::JoinError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
