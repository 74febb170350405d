//! Error types and handling for the `AeroDex` service

use thiserror::Error;

/// Main error type for the `AeroDex` service
#[derive(Error, Debug)]
pub enum AeroDexError {
    /// The outbound call did not complete or returned a non-2xx status
    #[error("Upstream request failed: {source}")]
    Upstream {
        #[from]
        source: reqwest::Error,
    },

    /// An expected request body field was absent or had the wrong shape
    #[error("Missing required field `{field}`")]
    InputMissing { field: &'static str },

    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl AeroDexError {
    /// Create a new missing-input error
    pub fn input_missing(field: &'static str) -> Self {
        Self::InputMissing { field }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// A local HTTP client that could not be set up, which is a startup problem
    pub fn client_build(source: reqwest::Error) -> Self {
        Self::config(format!("Failed to build HTTP client: {source}"))
    }

    /// Whether the failure came from the upstream provider rather than the caller
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        matches!(self, AeroDexError::Upstream { .. })
    }
}
