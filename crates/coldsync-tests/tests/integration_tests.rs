//! Integration tests for coldsync
//!
//! These tests run whole backup and restore cycles against the in-memory
//! store and check the observable contract of each mode.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use coldsync_compression::{StreamCodec, StreamingConfig};
use coldsync_config::{ConfigBuilder, ConfigLoader};
use coldsync_store::MemoryStore;
use coldsync_sync::{
    ExecutorOptions, Granularity, LocalInventory, ObjectLayout, PathMapper, ProgressCounter,
    RemoteInventory, SyncEngine, SyncOptions, TransferExecutor,
};
use coldsync_tests::test_utils::{
    at, generate_test_data, memory_engine, read_tree, TestDataPattern, TreeFixture,
};
use coldsync_types::{
    BufferSize, CompressionLevel, ErrorKind, GroupDepth, Location, LogicalPath, NoopProgress,
    StorageClass, TaskKind, ThreadCount, TransferTask,
};
use rstest::rstest;
use tokio_util::sync::CancellationToken;

fn paths(planned: &[LogicalPath]) -> Vec<&str> {
    planned.iter().map(LogicalPath::as_str).collect()
}

#[tokio::test]
async fn test_listing_spans_every_page() {
    let store = MemoryStore::with_page_size(1000);
    let now = SystemTime::now();
    for i in 0..3000 {
        store.insert("bucket", &format!("backups/file{:05}.zst", i), vec![], now);
    }
    store.insert("bucket", "backups2/leak.zst", vec![], now);

    let inventory = RemoteInventory::new(&store, "bucket");
    let mapper = PathMapper::new("/unused", "backups", ObjectLayout::Compressed);

    let entries = inventory.list_entries(&mapper.list_prefix()).await.unwrap();
    assert_eq!(entries.len(), 3000);

    let mapped = inventory.list(&mapper).await.unwrap();
    assert_eq!(mapped.len(), 3000);
    assert!(mapped.contains_key(&LogicalPath::new("file02999").unwrap()));
}

#[tokio::test]
async fn test_listing_without_continuation_token_fails() {
    let store = MemoryStore::with_page_size(10);
    let now = SystemTime::now();
    for i in 0..25 {
        store.insert("bucket", &format!("p/{}.zst", i), vec![], now);
    }
    store.drop_token_after_page(1);

    let mapper = PathMapper::new("/unused", "p", ObjectLayout::Compressed);
    let error = RemoteInventory::new(&store, "bucket")
        .list(&mapper)
        .await
        .unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Listing);
}

#[test]
fn test_grouped_inventory_uses_newest_descendant() {
    let tree = TreeFixture::new();
    tree.file("p/q/r1/f.txt", b"1", 100);
    tree.file("p/q/r2/g.txt", b"2", 300);
    tree.file("p/s/r3/h.txt", b"3", 200);
    tree.dir("p/empty");

    let depth = GroupDepth::new(2).unwrap();
    let inventory = LocalInventory::new(tree.root(), Granularity::Grouped(depth))
        .walk()
        .unwrap();

    let keys: Vec<&str> = inventory.keys().map(LogicalPath::as_str).collect();
    assert_eq!(keys, vec!["p/q", "p/s"]);
    assert_eq!(inventory[&LogicalPath::new("p/q").unwrap()], at(300));
    assert_eq!(inventory[&LogicalPath::new("p/s").unwrap()], at(200));
}

#[tokio::test]
async fn test_one_failing_task_does_not_stop_the_rest() {
    let tree = TreeFixture::new();
    let store = Arc::new(MemoryStore::new());
    let mut tasks = Vec::new();
    for i in 1..=5 {
        let name = format!("f{}", i);
        tree.file(&name, name.as_bytes(), 1);
        tasks.push(TransferTask {
            logical_path: LogicalPath::new(&name).unwrap(),
            kind: TaskKind::UploadFile,
            source: Location::Local(tree.root().join(&name)),
            destination: Location::Remote {
                bucket: "bucket".to_string(),
                key: format!("p/{}.zst", name),
            },
        });
    }
    store.fail_put("p/f3.zst");

    let counter = Arc::new(ProgressCounter::new());
    let report = TransferExecutor::new(store.clone(), ExecutorOptions::default())
        .execute(tasks, counter.clone(), &CancellationToken::new())
        .await;

    assert_eq!(report.successes.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].logical_path.as_str(), "f3");
    assert_eq!(report.stats.succeeded, 4);
    assert_eq!(report.stats.failed, 1);

    let snapshot = counter.snapshot();
    assert_eq!(snapshot.planned, 5);
    assert_eq!(snapshot.finished(), 5);
    assert_eq!(store.keys("bucket").len(), 4);
}

#[rstest]
#[case::empty(0)]
#[case::below_one_buffer(1000)]
#[case::spanning_buffers(BufferSize::MIN * 5 + 17)]
#[tokio::test]
async fn test_codec_round_trip(#[case] size: usize) {
    let codec = StreamCodec::new(StreamingConfig {
        level: CompressionLevel::default(),
        buffer_size: BufferSize::new(BufferSize::MIN).unwrap(),
    });
    let data = generate_test_data(size, TestDataPattern::Noise);

    let compressed = codec.compress_bytes(&data).unwrap();
    let restored = codec.decompress_to_vec(&compressed[..]).await.unwrap();

    assert_eq!(restored, data);
}

#[tokio::test]
async fn test_grouped_backup_is_idempotent() {
    let tree = TreeFixture::new();
    tree.file("a/x.txt", b"x", 10);
    tree.file("a/y.txt", b"y", 20);

    let store = Arc::new(MemoryStore::new());
    let engine = memory_engine(&store);
    let depth = GroupDepth::new(1).unwrap();

    let before_upload = SystemTime::now() - Duration::from_secs(1);
    let first = engine
        .backup_grouped("bucket", "p", tree.root(), depth)
        .await
        .unwrap();
    assert_eq!(paths(&first.planned), vec!["a"]);
    assert!(first.is_success());

    let mapper = PathMapper::new(tree.root(), "p", ObjectLayout::CompressedArchive);
    let remote = RemoteInventory::new(store.as_ref(), "bucket")
        .list(&mapper)
        .await
        .unwrap();
    let uploaded = remote[&LogicalPath::new("a").unwrap()];
    assert!(uploaded >= before_upload);

    let second = engine
        .backup_grouped("bucket", "p", tree.root(), depth)
        .await
        .unwrap();
    assert!(second.planned.is_empty());
    assert_eq!(store.put_count(), 1);
}

#[tokio::test]
async fn test_flat_backup_uploads_only_changed_files() {
    let tree = TreeFixture::new();
    tree.file("docs/a.txt", b"a", 10);
    tree.file("docs/b.txt", b"b", 10);

    let store = Arc::new(MemoryStore::new());
    let engine = memory_engine(&store);

    let first = engine.backup_flat("bucket", "home", tree.root()).await.unwrap();
    assert_eq!(paths(&first.planned), vec!["docs/a.txt", "docs/b.txt"]);

    // A file touched into the future is newer than its upload
    let future = SystemTime::now() + Duration::from_secs(3600);
    let future_secs = future
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_secs();
    tree.touch("docs/b.txt", i64::try_from(future_secs).unwrap());
    tree.file("docs/c.txt", b"c", 10);

    let second = engine.backup_flat("bucket", "home", tree.root()).await.unwrap();
    assert_eq!(paths(&second.planned), vec!["docs/b.txt", "docs/c.txt"]);
    assert_eq!(
        store.keys("bucket"),
        vec!["home/docs/a.txt.zst", "home/docs/b.txt.zst", "home/docs/c.txt.zst"]
    );
}

#[tokio::test]
async fn test_flat_backup_and_restore_reproduce_tree() {
    let tree = TreeFixture::new();
    tree.file("photos/cat.jpg", &generate_test_data(200_000, TestDataPattern::Noise), 5);
    tree.file("notes/today.md", &generate_test_data(3_000, TestDataPattern::Text), 5);
    tree.file("empty.bin", b"", 5);

    let store = Arc::new(MemoryStore::new());
    let engine = memory_engine(&store);
    engine.backup_flat("bucket", "home", tree.root()).await.unwrap();

    let target = TreeFixture::new();
    let report = engine.restore("bucket", "home", target.root()).await.unwrap();

    assert!(report.is_success());
    assert_eq!(read_tree(target.root()), read_tree(tree.root()));
}

#[tokio::test]
async fn test_grouped_backup_and_archive_restore_reproduce_tree() {
    let tree = TreeFixture::new();
    tree.file("projects/alpha/src/main.rs", b"fn main() {}", 5);
    tree.file("projects/alpha/README", b"alpha", 5);
    tree.file("projects/beta/data.csv", &generate_test_data(50_000, TestDataPattern::Text), 5);

    let store = Arc::new(MemoryStore::new());
    let engine = memory_engine(&store);
    let depth = GroupDepth::new(2).unwrap();
    engine
        .backup_grouped("bucket", "archive", tree.root(), depth)
        .await
        .unwrap();
    assert_eq!(
        store.keys("bucket"),
        vec![
            "archive/projects/alpha.zip.zst",
            "archive/projects/beta.zip.zst"
        ]
    );

    let target = TreeFixture::new();
    let report = engine
        .restore_archive("bucket", "archive", target.root())
        .await
        .unwrap();

    assert_eq!(report.transfer.stats.succeeded, 2);
    assert_eq!(read_tree(target.root()), read_tree(tree.root()));
}

#[tokio::test]
async fn test_corrupt_object_fails_only_its_task() {
    let store = Arc::new(MemoryStore::new());
    let codec = StreamCodec::default();
    let now = SystemTime::now();
    store.insert("bucket", "p/good.txt.zst", codec.compress_bytes(b"good").unwrap(), now);
    store.insert("bucket", "p/bad.txt.zst", b"not zstd at all".to_vec(), now);

    let target = TreeFixture::new();
    let report = memory_engine(&store)
        .restore("bucket", "p", target.root())
        .await
        .unwrap();

    assert_eq!(report.transfer.successes.len(), 1);
    assert_eq!(report.transfer.failures.len(), 1);
    let failure = &report.transfer.failures[0];
    assert_eq!(failure.logical_path.as_str(), "bad.txt");
    assert_eq!(failure.error.kind(), ErrorKind::Integrity);
    assert_eq!(read_tree(target.root()).keys().collect::<Vec<_>>(), vec!["good.txt"]);
}

#[tokio::test]
async fn test_restore_request_targets_archived_objects() {
    let store = Arc::new(MemoryStore::new());
    let now = SystemTime::now();
    store.insert_with_class("bucket", "p/a.zst", vec![], now, Some(StorageClass::Glacier));
    store.insert_with_class("bucket", "p/b.zip.zst", vec![], now, Some(StorageClass::DeepArchive));
    store.insert_with_class("bucket", "p/c.zst", vec![], now, Some(StorageClass::Standard));
    store.fail_restore("p/a.zst");

    let engine = memory_engine(&store);
    let report = engine.request_restore("bucket", "p").await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.transfer.stats.succeeded, 1);
    assert_eq!(report.transfer.failures.len(), 1);
    assert_eq!(report.transfer.failures[0].logical_path.as_str(), "a.zst");

    // A second request for an object already being restored still succeeds
    let again = engine.request_restore("bucket", "p").await.unwrap();
    assert!(again
        .transfer
        .successes
        .iter()
        .any(|s| s.logical_path.as_str() == "b.zip.zst"));
}

#[tokio::test]
async fn test_dry_run_reports_plan_without_uploading() {
    let tree = TreeFixture::new();
    tree.file("a/b/c.txt", b"c", 1);

    let store = Arc::new(MemoryStore::new());
    let options = SyncOptions {
        dry_run: true,
        workers: ThreadCount::new(1).unwrap(),
        ..SyncOptions::default()
    };
    let report = SyncEngine::new(store.clone(), options)
        .with_progress(Arc::new(NoopProgress))
        .backup_grouped("bucket", "p", tree.root(), GroupDepth::new(1).unwrap())
        .await
        .unwrap();

    assert_eq!(paths(&report.planned), vec!["a"]);
    assert!(store.keys("bucket").is_empty());
}

#[test]
fn test_engine_options_follow_configuration_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("coldsync.yaml");
    std::fs::write(
        &path,
        "transfer:\n  workers: 3\n  storage_class: deep-archive\nrestore:\n  days: 9\n",
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();
    let options = SyncOptions::from_config(&config);

    assert_eq!(options.workers.get(), 3);
    assert_eq!(options.storage_class, StorageClass::DeepArchive);
    assert_eq!(options.grouped_storage_class, StorageClass::Standard);
    assert_eq!(options.restore_days, 9);
    assert!(!options.dry_run);

    let defaults = SyncOptions::from_config(&ConfigBuilder::new().add_defaults().build().unwrap());
    assert_eq!(defaults.restore_days, 2);
}
