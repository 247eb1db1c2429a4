//! Error types and handling for Argus
//!
//! This module defines the error types used throughout the application,
//! providing consistent error handling and reporting.

use thiserror::Error;

/// Result type alias for Argus operations
pub type Result<T> = std::result::Result<T, ArgusError>;

/// Main error type for Argus
#[derive(Debug, Error)]
pub enum ArgusError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Status page sampling errors
    #[error("Probe error: {message}")]
    Probe { message: String },

    /// Persisted state store errors
    #[error("State store error: {message}")]
    Store { message: String },

    /// Notification transport errors
    #[error("Notify error: {message}")]
    Notify { message: String },

    /// External hook invocation errors
    #[error("Hook error: {message}")]
    Hook { message: String },

    /// Serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// File I/O errors
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Network-related errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Validation errors
    #[error("Validation error: {field} - {message}")]
    Validation { field: String, message: String },

    /// Timeout errors
    #[error("Timeout error: {message}")]
    Timeout { message: String },

    /// Generic errors with context
    #[error("Error: {message}")]
    Generic { message: String },
}

impl ArgusError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        ArgusError::Config {
            message: message.into(),
        }
    }

    /// Create a new probe error
    pub fn probe<S: Into<String>>(message: S) -> Self {
        ArgusError::Probe {
            message: message.into(),
        }
    }

    /// Create a new state store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        ArgusError::Store {
            message: message.into(),
        }
    }

    /// Create a new notification error
    pub fn notify<S: Into<String>>(message: S) -> Self {
        ArgusError::Notify {
            message: message.into(),
        }
    }

    /// Create a new hook error
    pub fn hook<S: Into<String>>(message: S) -> Self {
        ArgusError::Hook {
            message: message.into(),
        }
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        ArgusError::Io {
            message: message.into(),
        }
    }

    /// Create a new network error
    pub fn network<S: Into<String>>(message: S) -> Self {
        ArgusError::Network {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(field: S, message: S) -> Self {
        ArgusError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error
    pub fn timeout<S: Into<String>>(message: S) -> Self {
        ArgusError::Timeout {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn generic<S: Into<String>>(message: S) -> Self {
        ArgusError::Generic {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for ArgusError {
    fn from(err: std::io::Error) -> Self {
        ArgusError::io(err.to_string())
    }
}

impl From<serde_yaml::Error> for ArgusError {
    fn from(err: serde_yaml::Error) -> Self {
        ArgusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ArgusError {
    fn from(err: serde_json::Error) -> Self {
        ArgusError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for ArgusError {
    fn from(err: reqwest::Error) -> Self {
        ArgusError::network(err.to_string())
    }
}

impl From<chrono::ParseError> for ArgusError {
    fn from(err: chrono::ParseError) -> Self {
        ArgusError::validation("datetime", &err.to_string())
    }
}
