// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Error types for backend operations.

use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The broad category of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The backend was configured incorrectly; fatal at construction time.
    Configuration,
    /// The backend could not be reached or the connection dropped.
    Connection,
    /// The backend answered with something the client did not expect.
    Protocol,
    /// A value could not be encoded or decoded.
    Serialization,
    /// The backend does not support the requested operation.
    Unsupported,
}

impl ErrorKind {
    /// Returns a stable, lowercase name for this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Connection => "connection",
            Self::Protocol => "protocol",
            Self::Serialization => "serialization",
            Self::Unsupported => "unsupported",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error from a backend operation.
///
/// This is an opaque error type: it carries an [`ErrorKind`] and the underlying cause.
/// Use [`std::error::Error::source()`] to reach the cause if needed.
///
/// # Example
///
/// ```
/// use cachegen_backend::{Error, ErrorKind};
///
/// let error = Error::connection("server went away");
/// assert_eq!(error.kind(), ErrorKind::Connection);
/// ```
#[derive(Debug, thiserror::Error)]
#[error("{kind} error: {cause}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    cause: BoxError,
}

impl Error {
    /// Creates a new error of the given kind from any cause.
    pub fn new(kind: ErrorKind, cause: impl Into<BoxError>) -> Self {
        Self {
            kind,
            cause: cause.into(),
        }
    }

    /// Creates a [`ErrorKind::Configuration`] error.
    pub fn configuration(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Configuration, cause)
    }

    /// Creates a [`ErrorKind::Connection`] error.
    pub fn connection(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Connection, cause)
    }

    /// Creates a [`ErrorKind::Protocol`] error.
    pub fn protocol(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Protocol, cause)
    }

    /// Creates a [`ErrorKind::Serialization`] error.
    pub fn serialization(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Serialization, cause)
    }

    /// Creates a [`ErrorKind::Unsupported`] error.
    pub fn unsupported(cause: impl Into<BoxError>) -> Self {
        Self::new(ErrorKind::Unsupported, cause)
    }

    /// Returns the category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// A specialized [`Result`] type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
