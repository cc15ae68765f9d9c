// src/error.rs

//! Unified error handling for the watcher.

use std::fmt;

use thiserror::Error;

/// Result type alias for watcher operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// CSS selector parsing failed
    #[error("Invalid selector '{selector}': {message}")]
    Selector { selector: String, message: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// A site adapter failed to produce results for a keyword
    #[error("Adapter error for [{site}] '{keyword}': {message}")]
    Adapter {
        site: String,
        keyword: String,
        message: String,
    },

    /// A site adapter did not answer in time
    #[error("Adapter timed out for [{site}] '{keyword}' after {secs}s")]
    Timeout {
        site: String,
        keyword: String,
        secs: u64,
    },

    /// A notification could not be delivered
    #[error("Delivery to {recipient} failed: {message}")]
    Notify { recipient: i64, message: String },

    /// The seen-link store could not be written
    #[error("Persist error for [{site}]: {message}")]
    Persist { site: String, message: String },
}

impl AppError {
    /// Create a selector parsing error.
    pub fn selector(selector: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.to_string(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an adapter error for a site/keyword pair.
    pub fn adapter(
        site: impl Into<String>,
        keyword: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::Adapter {
            site: site.into(),
            keyword: keyword.into(),
            message: message.to_string(),
        }
    }

    /// Create an adapter timeout error.
    pub fn timeout(site: impl Into<String>, keyword: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            site: site.into(),
            keyword: keyword.into(),
            secs,
        }
    }

    /// Create a delivery error.
    pub fn notify(recipient: i64, message: impl fmt::Display) -> Self {
        Self::Notify {
            recipient,
            message: message.to_string(),
        }
    }

    /// Create a persistence error.
    pub fn persist(site: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Persist {
            site: site.into(),
            message: message.to_string(),
        }
    }
}
