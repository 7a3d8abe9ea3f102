//! Core type system and error handling for coldsync
//!
//! This crate provides the foundational types, error handling, and shared data structures
//! used throughout the coldsync workspace. It includes:
//!
//! - **Error handling**: One error enum with severity levels separating systemic from per-task failures
//! - **Core types**: Logical paths, remote and local entries, transfer tasks and statistics
//! - **Traits**: The object store and progress reporting collaborators
//! - **Configuration**: Validated newtypes for worker counts, buffer sizes and grouping depth
//!
//! # Features
//!
//! - `serde` (default): Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use coldsync_types::{LogicalPath, Result};
//!
//! fn example_operation() -> Result<LogicalPath> {
//!     LogicalPath::new("photos/2020/")
//! }
//!
//! assert_eq!(example_operation().unwrap().as_str(), "photos/2020");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{BufferSize, CompressionLevel, GroupDepth, ThreadCount};
pub use error::{Error, ErrorKind, ErrorSeverity, Result};
pub use traits::*;
pub use types::*;
