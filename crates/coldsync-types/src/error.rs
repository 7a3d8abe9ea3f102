//! Error types and handling for coldsync
//!
//! Errors fall into two groups. Systemic errors (remote listing failed, local
//! root cannot be walked, invalid configuration) abort a whole run because the
//! diff cannot be trusted. Every other error is local to one entry or one
//! transfer and is recorded without stopping sibling work.

use std::path::PathBuf;

/// Result alias used across the workspace
pub type Result<T> = std::result::Result<T, Error>;

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the entry is skipped and the run continues
    Low,
    /// Medium severity - the task fails and the run continues
    Medium,
    /// High severity - the run must be aborted
    High,
}

/// Main error type for coldsync operations
#[derive(thiserror::Error, Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Error {
    /// Remote enumeration failed
    #[error("Listing error for '{prefix}': {message}")]
    Listing {
        /// Remote prefix that was being listed
        prefix: String,
        /// Error message from the store
        message: String,
    },

    /// A local path or remote key could not be mapped
    #[error("Path error for '{path}': {message}")]
    Path {
        /// Offending path or key
        path: String,
        /// Why the mapping was rejected
        message: String,
    },

    /// Network or codec failure while moving one object
    #[error("Transfer error for '{path}': {message}")]
    Transfer {
        /// Logical path of the failed task
        path: String,
        /// Error message describing the failure
        message: String,
    },

    /// Decompression or archive extraction failure
    #[error("Integrity error for '{path}': {message}")]
    Integrity {
        /// Logical path of the failed task
        path: String,
        /// Error message describing the corruption
        message: String,
    },

    /// I/O operation failed
    #[error("I/O error: {message}")]
    Io {
        /// Error message from the I/O operation
        message: String,
    },

    /// The local root could not be walked
    #[error("Cannot walk '{root}': {message}")]
    Walk {
        /// Root directory that failed
        root: PathBuf,
        /// Error message from the walker
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Compression error
    #[error("Compression error: {message}")]
    Compression {
        /// Error message describing the compression issue
        message: String,
    },

    /// Archive container error
    #[error("Archive error: {message}")]
    Archive {
        /// Error message describing the archive issue
        message: String,
    },

    /// Remote store request failed
    #[error("Store error: {message}")]
    Store {
        /// Error message returned by the store client
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,

    /// Generic error with custom message
    #[error("{message}")]
    Other {
        /// Custom error message
        message: String,
    },
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Remote listing errors
    Listing,
    /// Path mapping errors
    Path,
    /// Per-task transfer errors
    Transfer,
    /// Corrupted payload errors
    Integrity,
    /// I/O related errors
    Io,
    /// Local walk errors
    Walk,
    /// Configuration errors
    Config,
    /// Compression errors
    Compression,
    /// Archive errors
    Archive,
    /// Store errors
    Store,
    /// Cancellation
    Cancelled,
    /// Other errors
    Other,
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Listing { .. } => ErrorKind::Listing,
            Self::Path { .. } => ErrorKind::Path,
            Self::Transfer { .. } => ErrorKind::Transfer,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Io { .. } => ErrorKind::Io,
            Self::Walk { .. } => ErrorKind::Walk,
            Self::Config { .. } => ErrorKind::Config,
            Self::Compression { .. } => ErrorKind::Compression,
            Self::Archive { .. } => ErrorKind::Archive,
            Self::Store { .. } => ErrorKind::Store,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Other { .. } => ErrorKind::Other,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Listing { .. } | Self::Walk { .. } | Self::Config { .. } => ErrorSeverity::High,
            Self::Path { .. } | Self::Cancelled => ErrorSeverity::Low,
            Self::Transfer { .. }
            | Self::Integrity { .. }
            | Self::Io { .. }
            | Self::Compression { .. }
            | Self::Archive { .. }
            | Self::Store { .. }
            | Self::Other { .. } => ErrorSeverity::Medium,
        }
    }

    /// Whether this error must abort the whole run
    pub fn is_fatal(&self) -> bool {
        self.severity() == ErrorSeverity::High
    }

    /// Create a new listing error
    pub fn listing<P: Into<String>, S: Into<String>>(prefix: P, message: S) -> Self {
        Self::Listing {
            prefix: prefix.into(),
            message: message.into(),
        }
    }

    /// Create a new path error
    pub fn path<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new transfer error
    pub fn transfer<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Transfer {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new integrity error
    pub fn integrity<P: Into<String>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Integrity {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new walk error
    pub fn walk<P: Into<PathBuf>, S: Into<String>>(root: P, message: S) -> Self {
        Self::Walk {
            root: root.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new compression error
    pub fn compression<S: Into<String>>(message: S) -> Self {
        Self::Compression {
            message: message.into(),
        }
    }

    /// Create a new archive error
    pub fn archive<S: Into<String>>(message: S) -> Self {
        Self::Archive {
            message: message.into(),
        }
    }

    /// Create a new store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a new generic error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Attach a task identity to a low-level error.
    ///
    /// Codec and archive failures become [`Error::Integrity`], everything that
    /// is not already task-scoped becomes [`Error::Transfer`].
    pub fn for_task(self, path: &str) -> Self {
        match self {
            Self::Transfer { .. } | Self::Integrity { .. } | Self::Cancelled => self,
            Self::Compression { message } | Self::Archive { message } => {
                Self::integrity(path, message)
            }
            other => Self::transfer(path, other.to_string()),
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
