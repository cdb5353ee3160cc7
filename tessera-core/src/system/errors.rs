//! System-level error types.

// Layer 1: Standard library imports
// (none)

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::group::GroupError;

/// System-level errors for substrate operations.
#[derive(Error, Debug)]
pub enum SystemError {
    /// Configuration validation error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Group subsystem error
    #[error("Group error: {0}")]
    Group(#[from] GroupError),
}

impl SystemError {
    /// Check if the error stems from invalid configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(self, SystemError::ConfigError(_))
    }
}
