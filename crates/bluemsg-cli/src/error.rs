//! Error handling for the BlueMsg CLI

use crate::config::ConfigError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error("BlueMsg error: {0}")]
    Core(#[from] bluemsg_core::BluemsgError),

    #[error("Radio error: {0}")]
    Radio(#[from] bluemsg_radio::RadioError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Runtime stopped: {0}")]
    RuntimeStopped(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

impl From<anyhow::Error> for CliError {
    fn from(err: anyhow::Error) -> Self {
        CliError::RuntimeStopped(format!("{:#}", err))
    }
}
