//! Error handling for artifact publishing
//!
//! This module provides the error taxonomy of a publish run with recovery
//! guidance, using the thiserror crate for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

/// Result alias used throughout the transfer engine
pub type PublishResult<T> = Result<T, PublishError>;

/// Main error type for artifact publishing operations
#[derive(Error, Debug)]
pub enum PublishError {
    // Configuration errors
    #[error("share '{reference}' is not configured")]
    ShareNotFound { reference: String },

    #[error("no CIFS shares are configured")]
    NoSharesConfigured,

    #[error("duplicate share definition: {display_url}")]
    DuplicateShare { display_url: String },

    #[error("configuration error: {0}")]
    ConfigError(String),

    // Pattern / path errors
    #[error("invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("destination '{destination}' escapes the share root")]
    InvalidDestination { destination: String },

    // Transfer errors
    #[error("failed to read local file {}: {source}", path.display())]
    LocalIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("remote operation on '{path}' failed: {message}")]
    RemoteIo { path: String, message: String },

    #[error("cannot connect to {server}: {message}")]
    Connection { server: String, message: String },

    #[error("remote operation on '{path}' timed out after {seconds}s")]
    Timeout { path: String, seconds: u64 },
}

impl PublishError {
    /// Wrap an I/O failure that happened on the remote side
    pub fn remote(path: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::RemoteIo {
            path: path.into(),
            message: err.to_string(),
        }
    }

    /// Errors that invalidate the whole connection rather than a single file.
    ///
    /// These abort the current entry and surface at the coordinator.
    pub fn is_connection_level(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::InvalidPattern { .. } | Self::ConfigError(_)
        )
    }

    /// Check if this error is recoverable by re-running the build
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::RemoteIo { .. } | Self::Connection { .. } | Self::Timeout { .. }
        )
    }

    /// Get suggested actions for this error
    pub fn suggested_actions(&self) -> Vec<&'static str> {
        match self {
            Self::ShareNotFound { .. } => vec![
                "Check the global share configuration",
                "Make sure the job references the share by its display URL",
            ],
            Self::NoSharesConfigured => vec!["Register at least one share in the global configuration"],
            Self::DuplicateShare { .. } => {
                vec!["Give every share a distinct server, port or directory"]
            }
            Self::ConfigError(_) => vec!["Run `cifs-publish validate` to see all configuration problems"],
            Self::InvalidPattern { .. } => vec![
                "Use ANT-style patterns such as `build/**/*.jar`",
                "Separate multiple patterns with commas or newlines",
            ],
            Self::InvalidDestination { .. } => {
                vec!["Remove `..` segments from the destination template"]
            }
            Self::LocalIo { .. } => vec!["Check that the build produced the file and it is readable"],
            Self::RemoteIo { .. } => vec![
                "Check write permissions of the share user",
                "Check free space on the file server",
            ],
            Self::Connection { .. } => vec![
                "Check that the server is reachable from the build agent",
                "Check domain, user and password of the share",
            ],
            Self::Timeout { .. } => vec![
                "Increase the share timeout",
                "Check network latency to the file server",
            ],
        }
    }

    /// Get error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Self::ShareNotFound { .. } => "SHARE_NOT_FOUND",
            Self::NoSharesConfigured => "NO_SHARES_CONFIGURED",
            Self::DuplicateShare { .. } => "DUPLICATE_SHARE",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidPattern { .. } => "INVALID_PATTERN",
            Self::InvalidDestination { .. } => "INVALID_DESTINATION",
            Self::LocalIo { .. } => "LOCAL_IO",
            Self::RemoteIo { .. } => "REMOTE_IO",
            Self::Connection { .. } => "CONNECTION_FAILED",
            Self::Timeout { .. } => "TIMEOUT",
        }
    }
}
