//! Core error types for pomocoach-core.
//!
//! Caller misuse of the scheduler (starting a session twice, pausing a
//! missing session, ...) is reported through `bool`/`Option` returns and never
//! reaches these types. What lives here are failures at the edges: the
//! configuration file, and the external collaborators (notification sinks and
//! the coaching hook) whose errors are caught and logged at the dispatch
//! boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomocoach-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML decoding errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML encoding errors
    #[error("TOML encode error: {0}")]
    TomlEncode(#[from] toml::ser::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown dot-path key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory could not be resolved or created
    #[error("Configuration directory unavailable: {0}")]
    DirectoryUnavailable(String),
}

/// Failure reported by a notification sink.
#[derive(Error, Debug)]
pub enum NotifyError {
    /// The sink's transport (chat webhook, channel, ...) rejected the message.
    #[error("Notification delivery failed: {0}")]
    Delivery(String),

    /// The receiving end of a channel sink has been dropped.
    #[error("Notification channel closed")]
    ChannelClosed,
}

/// Failure reported by a coaching hook.
#[derive(Error, Debug)]
pub enum CoachingError {
    /// The generator backend (LLM, template service, ...) failed.
    #[error("Coaching generator failed: {0}")]
    Generator(String),
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
