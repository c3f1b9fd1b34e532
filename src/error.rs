//! Centralized error types for mailtriage.

use std::path::PathBuf;
use thiserror::Error;

use crate::organize::executor::ExecutionReport;

/// All errors produced by the mailtriage library.
#[derive(Error, Debug)]
pub enum TriageError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A configuration value is out of range or malformed.
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    /// The configuration file exists but could not be parsed.
    #[error("Could not parse config file '{path}': {reason}")]
    ConfigParse { path: PathBuf, reason: String },

    /// The mailbox transport reported an error.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A transient transport failure stopped the run part-way.
    ///
    /// The report holds the outcome of every action up to the failure;
    /// actions after it are marked skipped.
    #[error("Run aborted: {source}")]
    RunAborted {
        report: Box<ExecutionReport>,
        source: TransportError,
    },
}

/// Convenience alias for `Result<T, TriageError>`.
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `InvalidConfig` variant.
    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// How a transport failure should be treated by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportErrorKind {
    /// Network, authentication or session loss. Stops the run.
    Transient,
    /// The server refused this one operation.
    Rejected,
    /// The folder or message does not exist.
    NotFound,
    /// The folder to create already exists.
    AlreadyExists,
}

/// An error reported by a [`crate::transport::Transport`].
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind:?} transport error on '{folder}': {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub folder: String,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, folder: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            folder: folder.into(),
            message: message.into(),
        }
    }

    pub fn transient(folder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Transient, folder, message)
    }

    pub fn rejected(folder: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Rejected, folder, message)
    }

    pub fn not_found(folder: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::NotFound, folder, "no such folder or message")
    }

    pub fn already_exists(folder: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::AlreadyExists, folder, "folder already exists")
    }

    /// `true` if this error should abort the whole run.
    pub fn is_transient(&self) -> bool {
        self.kind == TransportErrorKind::Transient
    }

    /// Wrap a filesystem error from a local transport.
    pub fn from_io(folder: impl Into<String>, e: &std::io::Error) -> Self {
        let kind = match e.kind() {
            std::io::ErrorKind::NotFound => TransportErrorKind::NotFound,
            std::io::ErrorKind::AlreadyExists => TransportErrorKind::AlreadyExists,
            std::io::ErrorKind::PermissionDenied => TransportErrorKind::Rejected,
            _ => TransportErrorKind::Transient,
        };
        Self::new(kind, folder, e.to_string())
    }
}
