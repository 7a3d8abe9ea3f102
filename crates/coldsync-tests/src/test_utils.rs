//! Shared fixtures for coldsync integration tests

use coldsync_store::MemoryStore;
use coldsync_sync::{SyncEngine, SyncOptions};
use coldsync_types::ThreadCount;
use filetime::{set_file_mtime, FileTime};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Test data generation patterns
#[derive(Debug, Clone, Copy)]
pub enum TestDataPattern {
    /// All zeros - highly compressible
    Zeros,
    /// Deterministic noise - barely compressible
    Noise,
    /// Repeating text - typical document content
    Text,
}

/// Generate test data with specified pattern
pub fn generate_test_data(size: usize, pattern: TestDataPattern) -> Vec<u8> {
    match pattern {
        TestDataPattern::Zeros => vec![0u8; size],
        TestDataPattern::Noise => {
            // xorshift keeps the data reproducible across runs
            let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
            (0..size)
                .map(|_| {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    (state >> 24) as u8
                })
                .collect()
        }
        TestDataPattern::Text => b"the quick brown fox jumps over the lazy dog\n"
            .iter()
            .copied()
            .cycle()
            .take(size)
            .collect(),
    }
}

/// Timestamp `secs` seconds after the epoch
pub fn at(secs: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs)
}

/// Builds a local tree with controlled modification times
pub struct TreeFixture {
    dir: TempDir,
}

impl TreeFixture {
    /// Empty tree in a fresh temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    /// Root of the tree
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write `contents` at `relative` and set its mtime to `mtime` seconds
    pub fn file(&self, relative: &str, contents: &[u8], mtime: i64) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        fs::write(&path, contents).expect("Failed to write test file");
        self.touch(relative, mtime);
        path
    }

    /// Set the mtime of an existing file
    pub fn touch(&self, relative: &str, mtime: i64) {
        set_file_mtime(
            self.dir.path().join(relative),
            FileTime::from_unix_time(mtime, 0),
        )
        .expect("Failed to set mtime");
    }

    /// Create an empty directory
    pub fn dir(&self, relative: &str) {
        fs::create_dir_all(self.dir.path().join(relative)).expect("Failed to create dir");
    }
}

impl Default for TreeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Every regular file under `root`, keyed by `/`-joined relative path
pub fn read_tree(root: &Path) -> BTreeMap<String, Vec<u8>> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .map(|entry| entry.expect("Failed to read entry"))
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| {
            let relative = entry
                .path()
                .strip_prefix(root)
                .expect("Entry outside root")
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            let contents = fs::read(entry.path()).expect("Failed to read file");
            (relative, contents)
        })
        .collect()
}

/// Engine over `store` with a small worker pool
pub fn memory_engine(store: &Arc<MemoryStore>) -> SyncEngine {
    let options = SyncOptions {
        workers: ThreadCount::new(4).expect("valid worker count"),
        ..SyncOptions::default()
    };
    SyncEngine::new(store.clone(), options)
}
