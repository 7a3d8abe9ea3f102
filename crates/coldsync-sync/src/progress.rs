//! Progress tracking for sync runs

use coldsync_types::{Error, ProgressReporter, TransferTask};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Phases of a sync run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncPhase {
    /// Listing the remote prefix
    ListingRemote,
    /// Walking the local root
    WalkingLocal,
    /// Computing the work list
    Planning,
    /// Running transfers
    Transferring,
    /// Finished
    Completed,
}

/// Point-in-time view of a [`ProgressCounter`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Tasks planned
    pub planned: u64,
    /// Tasks that succeeded so far
    pub completed: u64,
    /// Tasks that failed so far
    pub failed: u64,
    /// Bytes moved so far
    pub bytes: u64,
    /// Time since the counter was created
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    /// Tasks finished either way
    pub fn finished(&self) -> u64 {
        self.completed + self.failed
    }

    /// Completion percentage (0.0 to 100.0)
    pub fn percentage(&self) -> f64 {
        if self.planned == 0 {
            100.0
        } else {
            (self.finished() as f64 / self.planned as f64) * 100.0
        }
    }

    /// Throughput in bytes per second
    pub fn transfer_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Shared progress counter.
///
/// Counts every event with atomics and forwards it to an optional inner
/// reporter, so a display and the run's own bookkeeping see the same stream.
pub struct ProgressCounter {
    planned: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    bytes: AtomicU64,
    start: Instant,
    inner: Option<Arc<dyn ProgressReporter>>,
}

impl ProgressCounter {
    /// Counter with no downstream reporter
    pub fn new() -> Self {
        Self {
            planned: AtomicU64::new(0),
            completed: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            start: Instant::now(),
            inner: None,
        }
    }

    /// Counter that forwards every event to `inner`
    pub fn forwarding(inner: Arc<dyn ProgressReporter>) -> Self {
        Self {
            inner: Some(inner),
            ..Self::new()
        }
    }

    /// Current counts
    pub fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            planned: self.planned.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            elapsed: self.start.elapsed(),
        }
    }
}

impl Default for ProgressCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for ProgressCounter {
    fn report_planned(&self, total: u64) {
        self.planned.fetch_add(total, Ordering::Relaxed);
        if let Some(inner) = &self.inner {
            inner.report_planned(total);
        }
    }

    fn report_started(&self, task: &TransferTask) {
        debug!("Started {:?} {}", task.kind, task.logical_path);
        if let Some(inner) = &self.inner {
            inner.report_started(task);
        }
    }

    fn report_completed(&self, task: &TransferTask, bytes: u64) {
        self.completed.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
        debug!(
            "Completed {} ({} bytes): {} -> {}",
            task.logical_path, bytes, task.source, task.destination
        );
        if let Some(inner) = &self.inner {
            inner.report_completed(task, bytes);
        }
    }

    fn report_failed(&self, task: &TransferTask, err: &Error) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        debug!("Failed {}: {}", task.logical_path, err);
        if let Some(inner) = &self.inner {
            inner.report_failed(task, err);
        }
    }

    fn report_finished(&self) {
        if let Some(inner) = &self.inner {
            inner.report_finished();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldsync_types::{Location, LogicalPath, TaskKind};
    use std::sync::Mutex;

    fn task(path: &str) -> TransferTask {
        TransferTask {
            logical_path: LogicalPath::new(path).unwrap(),
            kind: TaskKind::UploadFile,
            source: Location::Local(path.into()),
            destination: Location::Remote {
                bucket: "b".to_string(),
                key: format!("{}.zst", path),
            },
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ProgressReporter for Recorder {
        fn report_planned(&self, total: u64) {
            self.events.lock().unwrap().push(format!("planned {}", total));
        }

        fn report_completed(&self, task: &TransferTask, bytes: u64) {
            self.events
                .lock()
                .unwrap()
                .push(format!("done {} {}", task.logical_path, bytes));
        }

        fn report_failed(&self, task: &TransferTask, _error: &Error) {
            self.events
                .lock()
                .unwrap()
                .push(format!("failed {}", task.logical_path));
        }
    }

    #[test]
    fn test_counts_events() {
        let counter = ProgressCounter::new();
        counter.report_planned(3);
        counter.report_completed(&task("a"), 100);
        counter.report_completed(&task("b"), 50);
        counter.report_failed(&task("c"), &Error::transfer("c", "boom"));

        let snapshot = counter.snapshot();
        assert_eq!(snapshot.planned, 3);
        assert_eq!(snapshot.completed, 2);
        assert_eq!(snapshot.failed, 1);
        assert_eq!(snapshot.bytes, 150);
        assert_eq!(snapshot.finished(), 3);
        assert!((snapshot.percentage() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_forwards_to_inner_reporter() {
        let recorder = Arc::new(Recorder::default());
        let counter = ProgressCounter::forwarding(recorder.clone());

        counter.report_planned(2);
        counter.report_completed(&task("a"), 7);
        counter.report_failed(&task("b"), &Error::transfer("b", "boom"));

        assert_eq!(
            *recorder.events.lock().unwrap(),
            vec!["planned 2", "done a 7", "failed b"]
        );
    }

    #[test]
    fn test_empty_run_is_complete() {
        let snapshot = ProgressCounter::new().snapshot();
        assert!((snapshot.percentage() - 100.0).abs() < f64::EPSILON);
    }
}
