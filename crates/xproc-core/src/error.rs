//! Error types for the service locator.
//!
//! Resolution failures (`DirectoryUnavailable`, `EndpointUnavailable`) are
//! reported to callers of `connection()` and `resolve()` as absent values; they
//! appear as errors only on forwarded calls and inside the crate. Transport
//! faults raised by an endpoint are carried through untouched.

use crate::identity::ServiceId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the locator.
#[derive(Debug, Error)]
pub enum LocatorError {
    // Resolution errors
    #[error("Directory unavailable: {message}")]
    DirectoryUnavailable { message: String },

    #[error("Remote endpoint unavailable for service {service_id}")]
    EndpointUnavailable { service_id: ServiceId },

    // Transport errors
    #[error("Remote endpoint is dead: {descriptor}")]
    DeadEndpoint { descriptor: String },

    #[error("Transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Descriptor errors
    #[error("Malformed endpoint descriptor: {message}")]
    Descriptor {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for locator operations.
pub type Result<T> = std::result::Result<T, LocatorError>;

impl From<std::io::Error> for LocatorError {
    fn from(err: std::io::Error) -> Self {
        LocatorError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for LocatorError {
    fn from(err: serde_json::Error) -> Self {
        LocatorError::Descriptor {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for LocatorError {
    fn from(err: rusqlite::Error) -> Self {
        LocatorError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl LocatorError {
    /// Create a transport error without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        LocatorError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Create a transport error wrapping the transport's own error.
    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        LocatorError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// True for faults raised by the transport while talking to an endpoint
    /// that was believed to be live.
    pub fn is_transport_fault(&self) -> bool {
        matches!(
            self,
            LocatorError::Transport { .. } | LocatorError::DeadEndpoint { .. }
        )
    }

    /// True when no endpoint could be obtained at all.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            LocatorError::DirectoryUnavailable { .. } | LocatorError::EndpointUnavailable { .. }
        )
    }

    /// Check if a later call may succeed where this one failed.
    ///
    /// Every failure in this crate is local to the call that raised it, so
    /// only configuration mistakes are reported as permanent.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, LocatorError::Config { .. })
    }
}
