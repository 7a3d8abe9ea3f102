//! Bounded-concurrency transfer executor
//!
//! Every task runs on its own tokio task, gated by a semaphore sized to the
//! worker count. CPU-bound work (compression, archiving, extraction) moves to
//! the blocking pool. A failing or panicking task is recorded against its
//! logical path and never stops its siblings. Each task owns exactly one
//! result slot, written once.

use coldsync_compression::{extract_archive, ArchiveWriter, StreamCodec, StreamingConfig};
use coldsync_types::{
    Error, Location, LogicalPath, ObjectStore, ProgressReporter, RestoreAck, RestoreTier, Result,
    StorageClass, TaskKind, ThreadCount, TransferStats, TransferTask,
};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::BufWriter;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Settings shared by every task of one run
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Maximum number of tasks in flight
    pub workers: ThreadCount,
    /// zstd codec settings
    pub codec: StreamingConfig,
    /// Storage class requested for uploads
    pub storage_class: Option<StorageClass>,
    /// Days a restored copy stays readable
    pub restore_days: u32,
    /// Restore retrieval tier
    pub restore_tier: RestoreTier,
    /// Root that archive entry names are relative to
    pub archive_root: Option<PathBuf>,
    /// Warn when one upload's uncompressed payload exceeds this
    pub memory_warn_bytes: u64,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            workers: ThreadCount::default(),
            codec: StreamingConfig::default(),
            storage_class: None,
            restore_days: 2,
            restore_tier: RestoreTier::Standard,
            archive_root: None,
            memory_warn_bytes: u64::MAX,
        }
    }
}

/// A task that completed
#[derive(Debug, Clone, Serialize)]
pub struct TransferSuccess {
    /// Task identity
    pub logical_path: LogicalPath,
    /// What the task did
    pub kind: TaskKind,
    /// Bytes moved
    pub bytes: u64,
}

/// A task that failed
#[derive(Debug, Clone, Serialize)]
pub struct TransferFailure {
    /// Task identity
    pub logical_path: LogicalPath,
    /// What the task tried to do
    pub kind: TaskKind,
    /// Why it failed
    pub error: Error,
}

/// Outcome of one executor run, partitioned and sorted by logical path
#[derive(Debug, Clone, Default, Serialize)]
pub struct TransferReport {
    /// Completed tasks
    pub successes: Vec<TransferSuccess>,
    /// Failed tasks
    pub failures: Vec<TransferFailure>,
    /// Aggregate counts
    pub stats: TransferStats,
}

impl TransferReport {
    /// Whether every task succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Executes transfer tasks against one store
pub struct TransferExecutor {
    runner: Arc<TaskRunner>,
    workers: ThreadCount,
}

impl TransferExecutor {
    /// Create an executor
    pub fn new(store: Arc<dyn ObjectStore>, options: ExecutorOptions) -> Self {
        let workers = options.workers;
        Self {
            runner: Arc::new(TaskRunner {
                store,
                codec: StreamCodec::new(options.codec),
                options,
            }),
            workers,
        }
    }

    /// Run every task, returning once all have finished.
    ///
    /// Once `cancel` fires no further task starts; the ones not yet started
    /// are recorded as [`Error::Cancelled`] and the in-flight ones finish.
    pub async fn execute(
        &self,
        tasks: Vec<TransferTask>,
        progress: Arc<dyn ProgressReporter>,
        cancel: &CancellationToken,
    ) -> TransferReport {
        let start = Instant::now();
        progress.report_planned(tasks.len() as u64);

        let semaphore = Arc::new(Semaphore::new(self.workers.get()));
        let mut slots: Vec<Option<Result<u64>>> = (0..tasks.len()).map(|_| None).collect();
        let mut join_set = JoinSet::new();

        for (index, task) in tasks.iter().enumerate() {
            let permit = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
            };

            let Some(permit) = permit else {
                let error = Error::Cancelled;
                progress.report_failed(task, &error);
                slots[index] = Some(Err(error));
                continue;
            };

            let runner = Arc::clone(&self.runner);
            let progress = Arc::clone(&progress);
            let task = task.clone();
            join_set.spawn(async move {
                let _permit = permit;
                progress.report_started(&task);

                let outcome = AssertUnwindSafe(runner.run(&task))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        Err(Error::other(format!("task panicked: {}", panic_message(&*panic))))
                    })
                    .map_err(|e| e.for_task(task.logical_path.as_str()));

                match &outcome {
                    Ok(bytes) => progress.report_completed(&task, *bytes),
                    Err(e) => {
                        error!("{} failed: {}", task.logical_path, e);
                        progress.report_failed(&task, e);
                    }
                }
                (index, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("Transfer worker aborted: {}", e),
            }
        }

        let mut report = TransferReport::default();
        for (task, slot) in tasks.into_iter().zip(slots) {
            let outcome = slot.unwrap_or_else(|| {
                let error = Error::transfer(
                    task.logical_path.as_str(),
                    "worker aborted before reporting",
                );
                progress.report_failed(&task, &error);
                Err(error)
            });

            match outcome {
                Ok(bytes) => {
                    report.stats.bytes_transferred += bytes;
                    report.successes.push(TransferSuccess {
                        logical_path: task.logical_path,
                        kind: task.kind,
                        bytes,
                    });
                }
                Err(error) => report.failures.push(TransferFailure {
                    logical_path: task.logical_path,
                    kind: task.kind,
                    error,
                }),
            }
        }
        progress.report_finished();

        report.successes.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));
        report.failures.sort_by(|a, b| a.logical_path.cmp(&b.logical_path));
        report.stats.succeeded = report.successes.len() as u64;
        report.stats.failed = report.failures.len() as u64;
        report.stats.planned = report.stats.succeeded + report.stats.failed;
        report.stats.duration = start.elapsed();

        info!(
            "Transfers finished: {} succeeded, {} failed in {:.2?}",
            report.stats.succeeded, report.stats.failed, report.stats.duration
        );
        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_error(error: JoinError) -> Error {
    Error::other(format!("blocking worker failed: {}", error))
}

fn local_of(location: &Location) -> Result<&Path> {
    match location {
        Location::Local(path) => Ok(path.as_path()),
        Location::Remote { .. } => Err(Error::other(format!(
            "expected a local location, got {}",
            location
        ))),
    }
}

fn remote_of(location: &Location) -> Result<(&str, &str)> {
    match location {
        Location::Remote { bucket, key } => Ok((bucket.as_str(), key.as_str())),
        Location::Local(_) => Err(Error::other(format!(
            "expected a remote location, got {}",
            location
        ))),
    }
}

/// Hidden sibling file that a download is written to before renaming
fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(
        ".{}.{}.partial",
        name,
        uuid::Uuid::new_v4().simple()
    ))
}

struct TaskRunner {
    store: Arc<dyn ObjectStore>,
    codec: StreamCodec,
    options: ExecutorOptions,
}

impl TaskRunner {
    async fn run(&self, task: &TransferTask) -> Result<u64> {
        match task.kind {
            TaskKind::UploadFile => self.upload_file(task).await,
            TaskKind::UploadArchive => self.upload_archive(task).await,
            TaskKind::DownloadFile => self.download_file(task).await,
            TaskKind::DownloadArchive => self.download_archive(task).await,
            TaskKind::RequestRestore => self.request_restore(task).await,
        }
    }

    async fn upload_file(&self, task: &TransferTask) -> Result<u64> {
        let path = local_of(&task.source)?.to_path_buf();
        let (bucket, key) = remote_of(&task.destination)?;
        let codec = self.codec;
        let warn_at = self.options.memory_warn_bytes;

        let payload = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let file = std::fs::File::open(&path).map_err(|e| Error::Io {
                message: format!("Failed to open '{}': {}", path.display(), e),
            })?;
            let size = file.metadata().map(|m| m.len()).unwrap_or(0);
            if size > warn_at {
                warn!(
                    "{} is {} bytes; its compressed form is held in memory until uploaded",
                    path.display(),
                    size
                );
            }
            codec.compress_reader(file)
        })
        .await
        .map_err(join_error)??;

        self.put(bucket, key, payload).await
    }

    async fn upload_archive(&self, task: &TransferTask) -> Result<u64> {
        let subtree = local_of(&task.source)?.to_path_buf();
        let (bucket, key) = remote_of(&task.destination)?;
        let root = self
            .options
            .archive_root
            .clone()
            .ok_or_else(|| Error::other("archive upload without an archive root"))?;
        let codec = self.codec;
        let warn_at = self.options.memory_warn_bytes;

        let payload = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut writer = ArchiveWriter::new();
            writer.append_tree(&root, &subtree)?;
            let (archive, summary) = writer.finish()?;

            if summary.bytes > warn_at {
                warn!(
                    "Group {} holds {} bytes; the whole archive is buffered in memory",
                    subtree.display(),
                    summary.bytes
                );
            }
            debug!(
                "Archived {} files ({} bytes) from {}",
                summary.entries,
                summary.bytes,
                subtree.display()
            );
            codec.compress_bytes(&archive)
        })
        .await
        .map_err(join_error)??;

        self.put(bucket, key, payload).await
    }

    async fn put(&self, bucket: &str, key: &str, payload: Vec<u8>) -> Result<u64> {
        let bytes = payload.len() as u64;
        self.store
            .put_object(bucket, key, payload, self.options.storage_class)
            .await?;
        Ok(bytes)
    }

    async fn download_file(&self, task: &TransferTask) -> Result<u64> {
        let (bucket, key) = remote_of(&task.source)?;
        let destination = local_of(&task.destination)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let body = self.store.get_object(bucket, key).await?;
        let partial = partial_path(destination);

        let result = async {
            let file = tokio::fs::File::create(&partial).await?;
            let mut writer = BufWriter::new(file);
            let written = self.codec.decompress_stream(body, &mut writer).await?;
            tokio::fs::rename(&partial, destination).await?;
            Ok::<u64, Error>(written)
        }
        .await;

        if result.is_err() {
            // Nothing useful to do if cleanup fails too
            let _ = tokio::fs::remove_file(&partial).await;
        }
        result
    }

    async fn download_archive(&self, task: &TransferTask) -> Result<u64> {
        let (bucket, key) = remote_of(&task.source)?;
        let destination = local_of(&task.destination)?.to_path_buf();

        let body = self.store.get_object(bucket, key).await?;
        let archive = self.codec.decompress_to_vec(body).await?;

        let summary = tokio::task::spawn_blocking(move || extract_archive(archive, &destination))
            .await
            .map_err(join_error)??;
        Ok(summary.bytes)
    }

    async fn request_restore(&self, task: &TransferTask) -> Result<u64> {
        let (bucket, key) = remote_of(&task.source)?;

        match self
            .store
            .restore_object(
                bucket,
                key,
                self.options.restore_days,
                self.options.restore_tier,
            )
            .await?
        {
            RestoreAck::Initiated => debug!("Restore requested for {}", key),
            RestoreAck::AlreadyInProgress => info!("Restore already in progress for {}", key),
        }
        Ok(0)
    }
}
