//! Error types and handling for ferrosync
//!
//! Errors are plain data: every variant carries owned strings so that a single
//! failure can be attached to a report entry and handed down to the entries
//! below it without re-running the failing operation.

use crate::Side;

/// Main error type for ferrosync operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// Entry does not exist in the store
    #[error("Not found: {path}")]
    NotFound {
        /// Store-relative path that was not found
        path: String,
    },

    /// Fetching metadata or a listing from one side failed
    #[error("Fetch failed on {side} '{path}': {message}")]
    Fetch {
        /// Side the fetch was issued against
        side: Side,
        /// Store-relative path
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Writing a namespace, copying content or removing an entry failed
    #[error("Write failed on {side} '{path}': {message}")]
    Write {
        /// Side that was being written
        side: Side,
        /// Store-relative path
        path: String,
        /// Underlying failure
        message: String,
    },

    /// Destination reported a different size or checksum than the source
    #[error(
        "Integrity mismatch on '{path}': expected {expected_size} bytes ({expected_checksum:?}), got {actual_size} bytes ({actual_checksum:?})"
    )]
    Integrity {
        /// Destination path
        path: String,
        /// Size recorded on the source
        expected_size: u64,
        /// Size reported by the destination
        actual_size: u64,
        /// Checksum recorded on the source
        expected_checksum: Option<String>,
        /// Checksum reported by the destination
        actual_checksum: Option<String>,
    },

    /// A root path could not be resolved before traversal
    #[error("Invalid {side} root '{path}': {message}")]
    InvalidRoot {
        /// Side whose root is invalid
        side: Side,
        /// Root path as supplied
        path: String,
        /// Why the root was rejected
        message: String,
    },

    /// An ancestor entry failed, so this entry was not visited
    #[error("Skipped '{path}': parent failed: {message}")]
    Inherited {
        /// Path of the skipped entry
        path: String,
        /// Message of the ancestor failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ErrorKind {
    /// I/O related errors
    Io,
    /// Metadata or listing fetch errors
    Fetch,
    /// Namespace, content or removal write errors
    Write,
    /// Post-copy integrity mismatch
    Integrity,
    /// Root resolution errors
    Root,
    /// Ancestor failure carried down the tree
    Inherited,
    /// Configuration errors
    Config,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::NotFound { .. } => ErrorKind::Io,
            Self::Fetch { .. } => ErrorKind::Fetch,
            Self::Write { .. } => ErrorKind::Write,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::InvalidRoot { .. } => ErrorKind::Root,
            Self::Inherited { .. } => ErrorKind::Inherited,
            Self::Config { .. } => ErrorKind::Config,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Whether this error aborts a whole synchronization run
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, Self::InvalidRoot { .. })
    }

    /// Whether this error means the entry simply does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Create a new I/O error
    pub fn io<S: Into<String>>(message: S) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Create a new not-found error
    pub fn not_found<S: Into<String>>(path: S) -> Self {
        Self::NotFound { path: path.into() }
    }

    /// Create a new fetch error tagged with side and path
    pub fn fetch<P: Into<String>, S: ToString>(side: Side, path: P, source: S) -> Self {
        Self::Fetch {
            side,
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Create a new write error tagged with side and path
    pub fn write<P: Into<String>, S: ToString>(side: Side, path: P, source: S) -> Self {
        Self::Write {
            side,
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Create a new invalid-root error
    pub fn invalid_root<P: Into<String>, S: Into<String>>(side: Side, path: P, message: S) -> Self {
        Self::InvalidRoot {
            side,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Wrap an ancestor failure for a descendant path
    pub fn inherited<P: Into<String>>(path: P, parent: &Error) -> Self {
        let message = match parent {
            Self::Inherited { message, .. } => message.clone(),
            other => other.to_string(),
        };
        Self::Inherited {
            path: path.into(),
            message,
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
        }
    }
}
