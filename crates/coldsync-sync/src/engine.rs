//! Main synchronization engine
//!
//! One [`SyncEngine`] drives the five operational modes. Backups diff a local
//! walk against a remote listing and upload what is stale; restores and
//! restore requests act on every object under the prefix.

use crate::{
    diff::{ChangeType, DiffPlanner},
    executor::{ExecutorOptions, TransferExecutor, TransferReport},
    local::{Granularity, LocalInventory},
    path::PathMapper,
    progress::{ProgressCounter, SyncPhase},
    remote::RemoteInventory,
    suffix::ObjectLayout,
};
use coldsync_compression::StreamingConfig;
use coldsync_config::Config;
use coldsync_types::{
    Error, GroupDepth, Location, LogicalPath, NoopProgress, ObjectStore, ProgressReporter,
    RestoreTier, Result, StorageClass, TaskKind, ThreadCount, TransferTask,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Operational mode of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Upload changed files one object each
    BackupFlat,
    /// Upload changed subtrees one archive each
    BackupGrouped,
    /// Download every file object
    Restore,
    /// Download and unpack every archive object
    RestoreArchive,
    /// Ask for every archived object to be restored
    RestoreRequest,
}

/// Synchronization options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
    /// Maximum concurrent transfers
    pub workers: ThreadCount,
    /// zstd codec settings
    pub codec: StreamingConfig,
    /// Storage class for flat uploads
    pub storage_class: StorageClass,
    /// Storage class for grouped uploads
    pub grouped_storage_class: StorageClass,
    /// Days a restored copy stays readable
    pub restore_days: u32,
    /// Restore retrieval tier
    pub restore_tier: RestoreTier,
    /// Warn when one upload's uncompressed payload exceeds this
    pub memory_warn_bytes: u64,
    /// Plan without transferring
    pub dry_run: bool,
}

impl SyncOptions {
    /// Options from a loaded configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            workers: config.transfer.workers,
            codec: StreamingConfig {
                level: config.compression.level,
                buffer_size: config.compression.buffer_size,
            },
            storage_class: config.transfer.storage_class,
            grouped_storage_class: config.transfer.grouped_storage_class,
            restore_days: config.restore.days,
            restore_tier: config.restore.tier,
            memory_warn_bytes: config.transfer.memory_warn_bytes,
            dry_run: false,
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Result of one run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    /// Identifier for log correlation
    pub run_id: uuid::Uuid,
    /// What was run
    pub mode: SyncMode,
    /// Whether transfers were skipped
    pub dry_run: bool,
    /// Paths that were planned, in order
    pub planned: Vec<LogicalPath>,
    /// Objects left out of a restore request because they are not archived
    pub skipped: usize,
    /// Per-task outcomes
    pub transfer: TransferReport,
    /// Wall-clock time of the whole run
    pub duration: Duration,
}

impl SyncReport {
    /// Whether every planned transfer succeeded
    pub fn is_success(&self) -> bool {
        self.transfer.is_success()
    }
}

/// Drives backups and restores against one store
pub struct SyncEngine {
    store: Arc<dyn ObjectStore>,
    options: SyncOptions,
    progress: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
}

impl SyncEngine {
    /// Create an engine over `store`
    pub fn new(store: Arc<dyn ObjectStore>, options: SyncOptions) -> Self {
        Self {
            store,
            options,
            progress: Arc::new(NoopProgress),
            cancel: CancellationToken::new(),
        }
    }

    /// Report task progress to `progress`
    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Stop starting new tasks once `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Engine options
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Upload every file under `root` whose remote copy is missing or older
    pub async fn backup_flat(&self, bucket: &str, prefix: &str, root: &Path) -> Result<SyncReport> {
        let mapper = PathMapper::new(root, prefix, ObjectLayout::Compressed);
        self.backup(
            SyncMode::BackupFlat,
            bucket,
            &mapper,
            Granularity::Flat,
            TaskKind::UploadFile,
            self.options.storage_class,
        )
        .await
    }

    /// Upload every directory at `depth` under `root` that changed since its
    /// archive was last uploaded
    pub async fn backup_grouped(
        &self,
        bucket: &str,
        prefix: &str,
        root: &Path,
        depth: GroupDepth,
    ) -> Result<SyncReport> {
        let mapper = PathMapper::new(root, prefix, ObjectLayout::CompressedArchive);
        self.backup(
            SyncMode::BackupGrouped,
            bucket,
            &mapper,
            Granularity::Grouped(depth),
            TaskKind::UploadArchive,
            self.options.grouped_storage_class,
        )
        .await
    }

    async fn backup(
        &self,
        mode: SyncMode,
        bucket: &str,
        mapper: &PathMapper,
        granularity: Granularity,
        kind: TaskKind,
        storage_class: StorageClass,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        info!(
            "Starting {:?} run {}: {} -> {}:{}",
            mode,
            run_id,
            mapper.root().display(),
            bucket,
            mapper.prefix()
        );

        let remote_inventory = RemoteInventory::new(self.store.as_ref(), bucket);
        let local_inventory = LocalInventory::new(mapper.root(), granularity);
        debug!("Phase {:?} and {:?}", SyncPhase::ListingRemote, SyncPhase::WalkingLocal);
        let (remote, local) = tokio::join!(
            remote_inventory.list(mapper),
            tokio::task::spawn_blocking(move || local_inventory.walk()),
        );
        let remote = remote?;
        let local = local.map_err(|e| {
            Error::walk(mapper.root(), format!("walk worker failed: {}", e))
        })??;

        debug!("Phase {:?}", SyncPhase::Planning);
        let changes = DiffPlanner::plan_changes(&remote, &local);
        let added = changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Added)
            .count();
        info!(
            "{} of {} local entries need upload ({} new, {} modified)",
            changes.len(),
            local.len(),
            added,
            changes.len() - added
        );

        let planned: Vec<LogicalPath> = changes.into_iter().map(|c| c.path).collect();
        let tasks = planned
            .iter()
            .map(|logical| TransferTask {
                logical_path: logical.clone(),
                kind,
                source: Location::Local(mapper.local_path(logical)),
                destination: Location::Remote {
                    bucket: bucket.to_string(),
                    key: mapper.remote_key(logical),
                },
            })
            .collect();

        let options = ExecutorOptions {
            storage_class: Some(storage_class),
            archive_root: Some(mapper.root().to_path_buf()),
            ..self.executor_options()
        };
        self.finish(mode, run_id, start, planned, 0, tasks, options, self.options.dry_run)
            .await
    }

    /// Download and decompress every file object under `prefix` into `destination`
    pub async fn restore(
        &self,
        bucket: &str,
        prefix: &str,
        destination: &Path,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        let mapper = PathMapper::new(destination, prefix, ObjectLayout::Compressed);
        info!(
            "Starting restore run {}: {}:{} -> {}",
            run_id,
            bucket,
            mapper.prefix(),
            destination.display()
        );

        // One task per destination file
        let entries = RemoteInventory::new(self.store.as_ref(), bucket)
            .list_newest(&mapper)
            .await?;

        let mut planned = Vec::with_capacity(entries.len());
        let mut tasks = Vec::with_capacity(entries.len());
        for (logical, entry) in entries {
            tasks.push(TransferTask {
                logical_path: logical.clone(),
                kind: TaskKind::DownloadFile,
                source: Location::Remote {
                    bucket: bucket.to_string(),
                    key: entry.key,
                },
                destination: Location::Local(mapper.local_path(&logical)),
            });
            planned.push(logical);
        }

        self.finish(
            SyncMode::Restore,
            run_id,
            start,
            planned,
            0,
            tasks,
            self.executor_options(),
            false,
        )
        .await
    }

    /// Download, decompress and unpack every archive object under `prefix`
    /// into `destination`
    pub async fn restore_archive(
        &self,
        bucket: &str,
        prefix: &str,
        destination: &Path,
    ) -> Result<SyncReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        let mapper = PathMapper::new(destination, prefix, ObjectLayout::CompressedArchive);
        info!(
            "Starting archive restore run {}: {}:{} -> {}",
            run_id,
            bucket,
            mapper.prefix(),
            destination.display()
        );

        let entries = RemoteInventory::new(self.store.as_ref(), bucket)
            .list_newest(&mapper)
            .await?;

        let destination: PathBuf = destination.to_path_buf();
        let mut planned = Vec::with_capacity(entries.len());
        let mut tasks = Vec::with_capacity(entries.len());
        for (logical, entry) in entries {
            tasks.push(TransferTask {
                logical_path: logical.clone(),
                kind: TaskKind::DownloadArchive,
                source: Location::Remote {
                    bucket: bucket.to_string(),
                    key: entry.key,
                },
                destination: Location::Local(destination.clone()),
            });
            planned.push(logical);
        }

        self.finish(
            SyncMode::RestoreArchive,
            run_id,
            start,
            planned,
            0,
            tasks,
            self.executor_options(),
            false,
        )
        .await
    }

    /// Ask the store to restore every archived object under `prefix`.
    ///
    /// Objects whose listed storage class needs no restore are skipped;
    /// objects with no reported class are requested anyway.
    pub async fn request_restore(&self, bucket: &str, prefix: &str) -> Result<SyncReport> {
        let start = Instant::now();
        let run_id = uuid::Uuid::new_v4();
        let mapper = PathMapper::new(PathBuf::new(), prefix, ObjectLayout::Raw);
        info!(
            "Starting restore request run {} for {}:{} ({} days, {} tier)",
            run_id,
            bucket,
            mapper.prefix(),
            self.options.restore_days,
            self.options.restore_tier.as_str()
        );

        let entries = RemoteInventory::new(self.store.as_ref(), bucket)
            .list_mapped(&mapper)
            .await?;

        let mut planned = Vec::with_capacity(entries.len());
        let mut tasks = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;
        for (logical, entry) in entries {
            if let Some(class) = entry.storage_class {
                if !class.requires_restore() {
                    debug!("Skipping {} in storage class {}", entry.key, class);
                    skipped += 1;
                    continue;
                }
            }

            let location = Location::Remote {
                bucket: bucket.to_string(),
                key: entry.key,
            };
            tasks.push(TransferTask {
                logical_path: logical.clone(),
                kind: TaskKind::RequestRestore,
                source: location.clone(),
                destination: location,
            });
            planned.push(logical);
        }

        if skipped > 0 {
            info!("{} objects are not in archival storage and were skipped", skipped);
        }

        self.finish(
            SyncMode::RestoreRequest,
            run_id,
            start,
            planned,
            skipped,
            tasks,
            self.executor_options(),
            false,
        )
        .await
    }

    fn executor_options(&self) -> ExecutorOptions {
        ExecutorOptions {
            workers: self.options.workers,
            codec: self.options.codec,
            storage_class: None,
            restore_days: self.options.restore_days,
            restore_tier: self.options.restore_tier,
            archive_root: None,
            memory_warn_bytes: self.options.memory_warn_bytes,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn finish(
        &self,
        mode: SyncMode,
        run_id: uuid::Uuid,
        start: Instant,
        planned: Vec<LogicalPath>,
        skipped: usize,
        tasks: Vec<TransferTask>,
        options: ExecutorOptions,
        dry_run: bool,
    ) -> Result<SyncReport> {
        let transfer = if dry_run {
            for task in &tasks {
                info!("Would transfer {} -> {}", task.source, task.destination);
            }
            TransferReport::default()
        } else {
            if self.cancel.is_cancelled() {
                warn!("Run {} cancelled before transfers started", run_id);
            }
            debug!("Phase {:?}", SyncPhase::Transferring);
            let counter = Arc::new(ProgressCounter::forwarding(Arc::clone(&self.progress)));
            let transfer = TransferExecutor::new(Arc::clone(&self.store), options)
                .execute(tasks, counter.clone(), &self.cancel)
                .await;

            let snapshot = counter.snapshot();
            info!(
                "Run {} finished {} of {} tasks ({:.1}%), {} bytes at {:.0} bytes/s",
                run_id,
                snapshot.finished(),
                snapshot.planned,
                snapshot.percentage(),
                snapshot.bytes,
                snapshot.transfer_rate()
            );
            transfer
        };

        debug!("Phase {:?}", SyncPhase::Completed);
        Ok(SyncReport {
            run_id,
            mode,
            dry_run,
            planned,
            skipped,
            transfer,
            duration: start.elapsed(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldsync_compression::StreamCodec;
    use coldsync_store::MemoryStore;
    use coldsync_types::ErrorKind;
    use filetime::{set_file_mtime, FileTime};
    use std::fs;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};
    use tempfile::TempDir;

    fn file(root: &Path, relative: &str, contents: &str, mtime: i64) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        set_file_mtime(&path, FileTime::from_unix_time(mtime, 0)).unwrap();
    }

    fn engine(store: &Arc<MemoryStore>) -> SyncEngine {
        let options = SyncOptions {
            workers: ThreadCount::new(2).unwrap(),
            ..SyncOptions::default()
        };
        SyncEngine::new(store.clone(), options)
    }

    #[tokio::test]
    async fn test_backup_flat_uploads_stale_files_only() {
        let dir = TempDir::new().unwrap();
        file(dir.path(), "a/x.txt", "x", 100);
        file(dir.path(), "a/y.txt", "y", 100);
        file(dir.path(), "z.txt", "z", 100);

        let store = Arc::new(MemoryStore::new());
        store.insert("b", "p/a/x.txt.zst", vec![], UNIX_EPOCH + Duration::from_secs(100));
        store.insert("b", "p/z.txt.zst", vec![], UNIX_EPOCH + Duration::from_secs(50));

        let report = engine(&store)
            .backup_flat("b", "p", dir.path())
            .await
            .unwrap();

        let planned: Vec<_> = report.planned.iter().map(LogicalPath::as_str).collect();
        assert_eq!(planned, vec!["a/y.txt", "z.txt"]);
        assert!(report.is_success());
        assert_eq!(
            store.object("b", "p/a/y.txt.zst").unwrap().storage_class,
            Some(StorageClass::Glacier)
        );
    }

    #[tokio::test]
    async fn test_backup_dry_run_transfers_nothing() {
        let dir = TempDir::new().unwrap();
        file(dir.path(), "a/x.txt", "x", 100);

        let store = Arc::new(MemoryStore::new());
        let options = SyncOptions {
            dry_run: true,
            ..SyncOptions::default()
        };
        let report = SyncEngine::new(store.clone(), options)
            .backup_flat("b", "p", dir.path())
            .await
            .unwrap();

        assert!(report.dry_run);
        assert_eq!(report.planned.len(), 1);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_backup_missing_root_aborts() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let error = engine(&store)
            .backup_flat("b", "p", &dir.path().join("absent"))
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Walk);
    }

    #[tokio::test]
    async fn test_backup_listing_failure_aborts() {
        let dir = TempDir::new().unwrap();
        file(dir.path(), "a.txt", "a", 1);
        let store = Arc::new(MemoryStore::new());
        store.fail_listing();

        let error = engine(&store)
            .backup_flat("b", "p", dir.path())
            .await
            .unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Listing);
        assert_eq!(store.put_count(), 0);
    }

    #[tokio::test]
    async fn test_flat_round_trip() {
        let source = TempDir::new().unwrap();
        file(source.path(), "docs/readme.md", "hello", 10);
        file(source.path(), "docs/deep/notes.txt", "notes", 10);

        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        engine.backup_flat("b", "p", source.path()).await.unwrap();

        let target = TempDir::new().unwrap();
        let report = engine.restore("b", "p", target.path()).await.unwrap();

        assert_eq!(report.transfer.stats.succeeded, 2);
        assert_eq!(
            fs::read_to_string(target.path().join("docs/readme.md")).unwrap(),
            "hello"
        );
        assert_eq!(
            fs::read_to_string(target.path().join("docs/deep/notes.txt")).unwrap(),
            "notes"
        );
    }

    #[tokio::test]
    async fn test_restore_keeps_newest_of_colliding_keys() {
        let codec = StreamCodec::default();
        let store = Arc::new(MemoryStore::new());
        store.insert(
            "b",
            "p/a/./x.txt.zst",
            codec.compress_reader(&b"older"[..]).unwrap(),
            UNIX_EPOCH + Duration::from_secs(10),
        );
        store.insert(
            "b",
            "p/a/x.txt.zst",
            codec.compress_reader(&b"newer"[..]).unwrap(),
            UNIX_EPOCH + Duration::from_secs(20),
        );

        let target = TempDir::new().unwrap();
        let report = engine(&store).restore("b", "p", target.path()).await.unwrap();

        let planned: Vec<_> = report.planned.iter().map(LogicalPath::as_str).collect();
        assert_eq!(planned, vec!["a/x.txt"]);
        assert_eq!(report.transfer.stats.succeeded, 1);
        assert_eq!(
            fs::read_to_string(target.path().join("a/x.txt")).unwrap(),
            "newer"
        );
    }

    #[derive(Default)]
    struct Tally {
        planned: AtomicU64,
        completed: AtomicU64,
    }

    impl ProgressReporter for Tally {
        fn report_planned(&self, total: u64) {
            self.planned.fetch_add(total, Ordering::Relaxed);
        }

        fn report_completed(&self, _task: &TransferTask, _bytes: u64) {
            self.completed.fetch_add(1, Ordering::Relaxed);
        }

        fn report_failed(&self, _task: &TransferTask, _error: &Error) {}
    }

    #[tokio::test]
    async fn test_progress_reaches_caller_reporter() {
        let dir = TempDir::new().unwrap();
        file(dir.path(), "a.txt", "a", 1);
        file(dir.path(), "b/c.txt", "c", 1);

        let store = Arc::new(MemoryStore::new());
        let tally = Arc::new(Tally::default());
        engine(&store)
            .with_progress(tally.clone())
            .backup_flat("b", "p", dir.path())
            .await
            .unwrap();

        assert_eq!(tally.planned.load(Ordering::Relaxed), 2);
        assert_eq!(tally.completed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_grouped_round_trip() {
        let source = TempDir::new().unwrap();
        file(source.path(), "photos/2020/a.jpg", "a", 10);
        file(source.path(), "photos/2021/b.jpg", "b", 10);

        let store = Arc::new(MemoryStore::new());
        let engine = engine(&store);
        let backup = engine
            .backup_grouped("b", "p", source.path(), GroupDepth::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(
            store.keys("b"),
            vec!["p/photos/2020.zip.zst", "p/photos/2021.zip.zst"]
        );
        assert_eq!(
            store.object("b", "p/photos/2020.zip.zst").unwrap().storage_class,
            Some(StorageClass::Standard)
        );
        assert_eq!(backup.transfer.stats.succeeded, 2);

        let target = TempDir::new().unwrap();
        engine
            .restore_archive("b", "p", target.path())
            .await
            .unwrap();

        assert_eq!(
            fs::read_to_string(target.path().join("photos/2020/a.jpg")).unwrap(),
            "a"
        );
        assert_eq!(
            fs::read_to_string(target.path().join("photos/2021/b.jpg")).unwrap(),
            "b"
        );
    }

    #[tokio::test]
    async fn test_request_restore_skips_hot_objects() {
        let store = Arc::new(MemoryStore::new());
        let now = SystemTime::now();
        store.insert_with_class("b", "p/cold", vec![], now, Some(StorageClass::Glacier));
        store.insert_with_class("b", "p/deep", vec![], now, Some(StorageClass::DeepArchive));
        store.insert_with_class("b", "p/hot", vec![], now, Some(StorageClass::Standard));
        store.insert("b", "p/unknown", vec![], now);

        let options = SyncOptions {
            restore_days: 2,
            restore_tier: RestoreTier::Standard,
            ..SyncOptions::default()
        };
        let report = SyncEngine::new(store.clone(), options)
            .request_restore("b", "p")
            .await
            .unwrap();

        assert_eq!(report.skipped, 1);
        let requested: Vec<_> = store
            .restore_requests()
            .into_iter()
            .map(|r| (r.key, r.days, r.tier))
            .collect();
        let mut requested_keys: Vec<_> = requested.iter().map(|(k, _, _)| k.as_str()).collect();
        requested_keys.sort_unstable();
        assert_eq!(requested_keys, vec!["p/cold", "p/deep", "p/unknown"]);
        assert!(requested
            .iter()
            .all(|(_, days, tier)| *days == 2 && *tier == RestoreTier::Standard));
    }

    #[tokio::test]
    async fn test_cancelled_engine_records_cancellations() {
        let dir = TempDir::new().unwrap();
        file(dir.path(), "a.txt", "a", 1);
        file(dir.path(), "b.txt", "b", 1);

        let store = Arc::new(MemoryStore::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = engine(&store)
            .with_cancellation(cancel)
            .backup_flat("b", "p", dir.path())
            .await
            .unwrap();

        assert_eq!(report.transfer.failures.len(), 2);
        assert!(report
            .transfer
            .failures
            .iter()
            .all(|f| f.error.kind() == ErrorKind::Cancelled));
        assert_eq!(store.put_count(), 0);
    }
}
