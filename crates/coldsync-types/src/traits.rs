//! Collaborator traits for coldsync
//!
//! The sync engine talks to the remote store and to the progress display only
//! through these traits, so both can be swapped for in-memory doubles.

use crate::{Error, ListPage, RestoreAck, RestoreTier, Result, StorageClass, TransferTask};
use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// Streaming body of a remote object
pub type ObjectBody = Pin<Box<dyn AsyncRead + Send>>;

/// Remote object store client.
///
/// Implementations surface every failure as an error; nothing is silently
/// dropped. Pagination is driven by the caller so that a truncated page is
/// never mistaken for a complete listing.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of keys under `prefix`, continuing from `continuation`
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage>;

    /// Open an object for streaming reads
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody>;

    /// Store a fully materialised payload under `key`
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        storage_class: Option<StorageClass>,
    ) -> Result<()>;

    /// Start a time-bounded restoration from archival storage
    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreAck>;
}

/// Trait for reporting progress during a run
pub trait ProgressReporter: Send + Sync {
    /// Report the number of planned tasks
    fn report_planned(&self, total: u64);

    /// Report that a task has started
    fn report_started(&self, _task: &TransferTask) {}

    /// Report that a task completed, with the bytes it moved
    fn report_completed(&self, task: &TransferTask, bytes: u64);

    /// Report that a task failed
    fn report_failed(&self, task: &TransferTask, error: &Error);

    /// Report that every task has finished
    fn report_finished(&self) {}
}

/// Progress reporter that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report_planned(&self, _total: u64) {}

    fn report_completed(&self, _task: &TransferTask, _bytes: u64) {}

    fn report_failed(&self, _task: &TransferTask, _error: &Error) {}
}
