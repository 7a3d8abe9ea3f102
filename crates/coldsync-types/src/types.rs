//! Core data types for coldsync
//!
//! Every value here is transient: it is derived at invocation time from the
//! filesystem or from a fresh remote listing and never outlives one run.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::{Error, Result};

/// Point in time used for staleness comparison
pub type Timestamp = SystemTime;

/// Slash-separated path relative to the local root and the remote prefix.
///
/// Always normalised: no leading, trailing or duplicate separators, no `.`
/// segments, and no `..` that would climb above the root.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LogicalPath(String);

impl LogicalPath {
    /// Separator between segments
    pub const SEPARATOR: char = '/';

    /// Normalise `raw` into a logical path.
    ///
    /// `..` segments are resolved lexically; one that would leave the root is
    /// rejected with [`Error::Path`], as is a path that normalises to nothing.
    pub fn new(raw: &str) -> Result<Self> {
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split(Self::SEPARATOR) {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(Error::path(raw, "path escapes the root"));
                    }
                }
                other => segments.push(other),
            }
        }

        if segments.is_empty() {
            return Err(Error::path(raw, "path is empty after normalisation"));
        }

        Ok(Self(segments.join("/")))
    }

    /// Borrow the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(Self::SEPARATOR)
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }
}

impl fmt::Display for LogicalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for LogicalPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Storage class of a remote object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StorageClass {
    /// Hot storage
    Standard,
    /// Infrequent access
    StandardIa,
    /// Automatic tiering
    IntelligentTiering,
    /// Archival class with millisecond retrieval
    GlacierInstantRetrieval,
    /// Archival class that requires a restore request
    Glacier,
    /// Deepest archival class, requires a restore request
    DeepArchive,
}

impl StorageClass {
    /// Wire name used by S3
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "STANDARD",
            Self::StandardIa => "STANDARD_IA",
            Self::IntelligentTiering => "INTELLIGENT_TIERING",
            Self::GlacierInstantRetrieval => "GLACIER_IR",
            Self::Glacier => "GLACIER",
            Self::DeepArchive => "DEEP_ARCHIVE",
        }
    }

    /// Parse an S3 wire name; unknown names yield `None`
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "STANDARD" => Some(Self::Standard),
            "STANDARD_IA" => Some(Self::StandardIa),
            "INTELLIGENT_TIERING" => Some(Self::IntelligentTiering),
            "GLACIER_IR" => Some(Self::GlacierInstantRetrieval),
            "GLACIER" => Some(Self::Glacier),
            "DEEP_ARCHIVE" => Some(Self::DeepArchive),
            _ => None,
        }
    }

    /// Whether objects in this class must be restored before they can be read
    pub fn requires_restore(self) -> bool {
        matches!(self, Self::Glacier | Self::DeepArchive)
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retrieval priority for archival-tier restoration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum RestoreTier {
    /// Standard retrieval
    #[default]
    Standard,
    /// Cheapest, slowest retrieval
    Bulk,
    /// Fastest retrieval
    Expedited,
}

impl RestoreTier {
    /// Wire name used by S3
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Standard => "Standard",
            Self::Bulk => "Bulk",
            Self::Expedited => "Expedited",
        }
    }
}

/// One object as returned by a remote listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// Full object key
    pub key: String,
    /// Provider's last-modified timestamp
    pub last_modified: Timestamp,
    /// Storage class, when the listing reports one
    pub storage_class: Option<StorageClass>,
}

/// One page of a remote listing
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page
    pub entries: Vec<RemoteEntry>,
    /// Token to request the following page
    pub next_token: Option<String>,
    /// Whether the provider reported more pages
    pub truncated: bool,
}

/// Reply to a restore request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreAck {
    /// A new restoration job was started
    Initiated,
    /// A restoration job for this object is already running
    AlreadyInProgress,
}

/// Direction of a transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Direction {
    /// Local to remote
    Upload,
    /// Remote to local
    Download,
    /// Ask the store to bring an object out of archival storage
    RestoreRequest,
}

/// The unit of work a task performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TaskKind {
    /// Compress one file and put it
    UploadFile,
    /// Archive a subtree, compress the archive and put it
    UploadArchive,
    /// Get one object, decompress it into a file
    DownloadFile,
    /// Get one object, decompress it and unpack the archive
    DownloadArchive,
    /// Issue an archival-tier restore request
    RequestRestore,
}

impl TaskKind {
    /// Direction of data flow for this kind of task
    pub fn direction(self) -> Direction {
        match self {
            Self::UploadFile | Self::UploadArchive => Direction::Upload,
            Self::DownloadFile | Self::DownloadArchive => Direction::Download,
            Self::RequestRestore => Direction::RestoreRequest,
        }
    }
}

/// Either end of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    /// A local file or directory
    Local(PathBuf),
    /// A remote object
    Remote {
        /// Bucket name
        bucket: String,
        /// Object key
        key: String,
    },
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local(path) => write!(f, "{}", path.display()),
            Self::Remote { bucket, key } => write!(f, "{}:{}", bucket, key),
        }
    }
}

/// A single planned transfer, consumed exactly once by the executor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    /// Identity used for reporting
    pub logical_path: LogicalPath,
    /// What the task does
    pub kind: TaskKind,
    /// Where the bytes come from
    pub source: Location,
    /// Where the bytes go
    pub destination: Location,
}

impl TransferTask {
    /// Direction of this task
    pub fn direction(&self) -> Direction {
        self.kind.direction()
    }
}

/// Transfer statistics for one run
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransferStats {
    /// Number of planned tasks
    pub planned: u64,
    /// Number of tasks that succeeded
    pub succeeded: u64,
    /// Number of tasks that failed
    pub failed: u64,
    /// Bytes moved over the wire
    pub bytes_transferred: u64,
    /// Total duration of the run
    pub duration: Duration,
}

impl TransferStats {
    /// Calculate the overall transfer rate
    pub fn transfer_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.bytes_transferred as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }
}
