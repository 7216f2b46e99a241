//! Error types and handling for the `UrbanLens` service

use thiserror::Error;

/// Main error type for the `UrbanLens` service
///
/// Upstream provider failures never surface here; they are absorbed by the
/// aggregator (see [`crate::sources::SourceError`]). Only conditions that make
/// a request impossible to answer end up as an `UrbanLensError`.
#[derive(Error, Debug)]
pub enum UrbanLensError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Malformed or unusable query input
    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },
}

impl UrbanLensError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new invalid-query error
    pub fn invalid_query<S: Into<String>>(message: S) -> Self {
        Self::InvalidQuery {
            message: message.into(),
        }
    }

    /// Short machine-friendly label used as the `error` field of API responses
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            UrbanLensError::Config { .. } => "Configuration error",
            UrbanLensError::InvalidQuery { .. } => "Invalid query",
        }
    }

    /// Get a user-friendly error message
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            UrbanLensError::Config { .. } => {
                "Configuration error. Please check your config file and API tokens.".to_string()
            }
            UrbanLensError::InvalidQuery { message } => {
                format!("Invalid query: {message}")
            }
        }
    }
}
