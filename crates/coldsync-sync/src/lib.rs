//! Incremental diff-and-transfer engine for coldsync
//!
//! This crate turns a local tree and a remote prefix into a minimal set of
//! transfer tasks and runs them:
//!
//! - **Remote inventory**: exhaustive paginated listing mapped back to logical paths
//! - **Local inventory**: flat per-file or grouped per-directory walks
//! - **Diff planning**: strict timestamp comparison, absent or older means upload
//! - **Transfer execution**: bounded worker pool with per-task failure isolation
//! - **Progress tracking**: shared counters forwarded to any reporter
//!
//! # Examples
//!
//! ```rust,no_run
//! use coldsync_sync::{SyncEngine, SyncOptions};
//! use coldsync_types::ObjectStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example(store: Arc<dyn ObjectStore>) -> coldsync_types::Result<()> {
//! let engine = SyncEngine::new(store, SyncOptions::default());
//! let report = engine
//!     .backup_flat("my-bucket", "backups/home", Path::new("/home/me"))
//!     .await?;
//! println!(
//!     "Uploaded {} of {} planned files",
//!     report.transfer.stats.succeeded,
//!     report.planned.len()
//! );
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod engine;
pub mod executor;
pub mod local;
pub mod path;
pub mod progress;
pub mod remote;
pub mod suffix;

pub use diff::{ChangeType, DiffPlanner, PlannedChange};
pub use engine::{SyncEngine, SyncMode, SyncOptions, SyncReport};
pub use executor::{
    ExecutorOptions, TransferExecutor, TransferFailure, TransferReport, TransferSuccess,
};
pub use local::{Granularity, LocalInventory};
pub use path::PathMapper;
pub use progress::{ProgressCounter, ProgressSnapshot, SyncPhase};
pub use remote::RemoteInventory;
pub use suffix::{ObjectLayout, Suffix};
