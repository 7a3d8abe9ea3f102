//! Compression and archive container for coldsync
//!
//! Remote objects are stored in one of three layouts:
//!
//! - **raw**: the local file bytes, unchanged
//! - **compressed** (`.zst`): one zstd stream over the file
//! - **compressed archive** (`.zip.zst`): one zstd stream over a zip container
//!   whose entries are stored uncompressed
//!
//! This crate provides the codec and the container. It knows nothing about
//! keys or buckets.
//!
//! # Examples
//!
//! ```rust
//! use coldsync_compression::StreamCodec;
//!
//! # tokio_test::block_on(async {
//! let codec = StreamCodec::default();
//! let data = b"Hello, world! This is test data for compression.";
//!
//! let compressed = codec.compress_bytes(data)?;
//! let decompressed = codec.decompress_to_vec(std::io::Cursor::new(compressed)).await?;
//!
//! assert_eq!(data, decompressed.as_slice());
//! # Ok::<(), coldsync_types::Error>(())
//! # });
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod streaming;

#[cfg(test)]
mod error_tests;

pub use archive::{extract_archive, ArchiveSummary, ArchiveWriter};
pub use streaming::{StreamCodec, StreamingConfig};
