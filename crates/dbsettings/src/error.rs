//! Error types for settings resolution.

use thiserror::Error;

/// Settings registry result type.
pub type Result<T> = std::result::Result<T, DbSettingsError>;

/// Settings registry errors.
#[derive(Error, Debug)]
pub enum DbSettingsError {
    /// A required argument was empty or absent
    #[error("Invalid argument: {field} must not be empty")]
    InvalidArgument { field: &'static str },

    /// A configuration entry could not be used to synthesize settings
    #[error("Configuration error in '{key}': {message}")]
    Configuration { key: String, message: String },

    /// Configuration file could not be parsed or validated
    #[error("Config error: {0}")]
    Config(String),

    /// IO error (reading or writing the config file)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbSettingsError {
    /// Create an invalid argument error.
    pub fn invalid_argument(field: &'static str) -> Self {
        Self::InvalidArgument { field }
    }

    /// Create a configuration error for the given entry key.
    pub fn configuration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Configuration {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a config file error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
