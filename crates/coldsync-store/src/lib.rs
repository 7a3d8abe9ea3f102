//! Remote object store clients for coldsync
//!
//! - [`S3Store`]: Amazon S3 and S3-compatible endpoints through `aws-sdk-s3`
//! - [`MemoryStore`]: an in-process store with failure injection, used by tests
//!
//! Both implement [`coldsync_types::ObjectStore`]; the sync engine only sees
//! the trait.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod memory;
pub mod s3;

pub use memory::{MemoryStore, RestoreRecord, StoredObject, DEFAULT_PAGE_SIZE};
pub use s3::S3Store;
