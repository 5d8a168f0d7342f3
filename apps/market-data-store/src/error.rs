//! Error taxonomy for the market data store.
//!
//! Every failure surfaces synchronously as a [`StoreError`]. Nothing is retried
//! internally and a failed write never mutates the container already on disk.
//!
//! | Code | Retryable | Usage |
//! |------|-----------|-------|
//! | `INVALID_DESCRIPTOR` | no | Bad instrument/date/resolution/kind input |
//! | `STORAGE_IO_FAILURE` | yes | Filesystem error (permissions, disk full, ...) |
//! | `CORRUPT_CONTAINER` | no | Existing container or entry cannot be decoded |
//! | `CONTAINER_NOT_FOUND` | no | Read of a path with no container |

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes for store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The instrument, date, resolution or kind combination is invalid.
    InvalidDescriptor,
    /// The filesystem refused an operation.
    StorageIoFailure,
    /// A container on disk could not be decoded.
    CorruptContainer,
    /// No container exists at the requested path.
    ContainerNotFound,
}

impl ErrorCode {
    /// Get the error reason string.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor => "INVALID_DESCRIPTOR",
            Self::StorageIoFailure => "STORAGE_IO_FAILURE",
            Self::CorruptContainer => "CORRUPT_CONTAINER",
            Self::ContainerNotFound => "CONTAINER_NOT_FOUND",
        }
    }

    /// Whether a caller may retry after remediation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageIoFailure)
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.reason())
    }
}

/// Errors raised by the resolver, codec and archive layers.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Bad input describing the instrument/date/resolution combination.
    #[error("invalid descriptor ({field}): {message}")]
    InvalidDescriptor {
        /// Offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },

    /// Filesystem failure while reading, writing or renaming.
    #[error("storage I/O failure at '{}': {source}", path.display())]
    StorageIoFailure {
        /// Path being operated on.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// An existing container or one of its entries cannot be decoded.
    #[error("corrupt container '{}': {message}", path.display())]
    CorruptContainer {
        /// Container path.
        path: PathBuf,
        /// Decode failure detail.
        message: String,
    },

    /// No container exists at the path.
    #[error("container not found: '{}'", path.display())]
    ContainerNotFound {
        /// Requested container path.
        path: PathBuf,
    },
}

impl StoreError {
    /// Build an `InvalidDescriptor` error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a `StorageIoFailure` error.
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::StorageIoFailure {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Build a `CorruptContainer` error.
    pub fn corrupt(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::CorruptContainer {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    /// Get the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidDescriptor { .. } => ErrorCode::InvalidDescriptor,
            Self::StorageIoFailure { .. } => ErrorCode::StorageIoFailure,
            Self::CorruptContainer { .. } => ErrorCode::CorruptContainer,
            Self::ContainerNotFound { .. } => ErrorCode::ContainerNotFound,
        }
    }

    /// Whether a caller may retry after remediation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}
