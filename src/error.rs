//! Error types for advisor.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdvisorError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Unknown configuration key: {key}")]
    ConfigUnknownKey { key: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Query errors
    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Unknown persona: {name}")]
    UnknownPersona { name: String },

    // Service errors (peripheral endpoints; the diagnostic core uses RequestError)
    #[error("Service request failed: {message}")]
    Service { message: String },

    #[error("Upload rejected: {message}")]
    UploadRejected { message: String },

    #[error(transparent)]
    Request(#[from] crate::service::error::RequestError),

    // Speech capture errors
    #[error("Speech capture failed: {message}")]
    Capture { message: String },

    // Playback errors
    #[error("Playback error: {message}")]
    Playback { message: String },

    #[error("No {what} image to save")]
    NoImage { what: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, AdvisorError>;
