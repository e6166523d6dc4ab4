//! Error types for the coach_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for coach_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Anchor timestamp without a usable ISO date prefix
    #[error("Invalid anchor timestamp '{0}'")]
    InvalidTimestamp(String),

    /// A stored plan record could not be decoded
    #[error("Decode error for user {user_id} field {field}: {message}")]
    Decode {
        user_id: String,
        field: String,
        message: String,
    },

    /// Heart-rate zone table is missing a band bound
    #[error("Zone lookup miss: {0}")]
    ZoneLookupMiss(String),

    /// No heart-rate zone table exists for the user
    #[error("No heart rate zones for user {0}")]
    MissingZones(String),

    /// A plan store read or write failed
    #[error("Persistence error for user {user_id}: {message}")]
    Persistence { user_id: String, message: String },

    /// Partner platform rejected or failed a request
    #[error("Partner error: {0}")]
    Partner(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn decode(user_id: &str, field: &str, message: impl ToString) -> Self {
        Error::Decode {
            user_id: user_id.to_string(),
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn persistence(user_id: &str, message: impl ToString) -> Self {
        Error::Persistence {
            user_id: user_id.to_string(),
            message: message.to_string(),
        }
    }
}
