//! Error types.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Boxed error carried by [`SyncError::SourceUnavailable`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Listing a resource from the cluster API failed (network, auth, or a
    /// malformed response).
    #[error("failed to list {resource} in namespace {namespace}: {source}")]
    SourceUnavailable {
        /// Resource kind being listed (e.g. `"ingresses"`).
        resource: &'static str,
        /// Namespace that was queried.
        namespace: String,
        /// Underlying client error.
        #[source]
        source: BoxError,
    },

    /// Reading the input hosts file or writing the output failed.
    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        /// What was being done (`"read"` or `"write"`).
        op: &'static str,
        /// The file involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The host pattern is not a valid regular expression.
    #[error("invalid host pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// The pattern as given.
        pattern: String,
        /// Compilation error.
        #[source]
        source: regex::Error,
    },

    /// Invalid or contradictory configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Builds a [`SyncError::SourceUnavailable`] from any client error.
    pub fn source_unavailable(
        resource: &'static str,
        namespace: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::SourceUnavailable {
            resource,
            namespace: namespace.into(),
            source: source.into(),
        }
    }

    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Returns `true` for errors detected before any pass runs.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. } | Self::InvalidConfig(_))
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io { source, .. } if source.kind() == std::io::ErrorKind::PermissionDenied)
    }
}
