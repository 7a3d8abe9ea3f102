//! JSON output structures for coldsync CLI

use coldsync_sync::{SyncMode, SyncReport};
use serde::Serialize;

/// Complete JSON output for one run
#[derive(Debug, Serialize)]
pub struct SyncResultJson {
    /// Run metadata
    pub metadata: RunMetadata,
    /// Aggregate counts
    pub stats: StatsJson,
    /// Paths that were planned
    pub planned: Vec<String>,
    /// Failed tasks
    pub failures: Vec<FailureJson>,
    /// Overall result
    pub result: RunResult,
}

/// Run metadata
#[derive(Debug, Serialize)]
pub struct RunMetadata {
    /// coldsync version
    pub version: String,
    /// Run identifier
    pub run_id: String,
    /// Operational mode
    pub mode: SyncMode,
    /// Whether transfers were skipped
    pub dry_run: bool,
    /// When the report was produced
    pub timestamp: String,
}

/// Aggregate counts
#[derive(Debug, Serialize)]
pub struct StatsJson {
    /// Tasks planned
    pub planned: u64,
    /// Tasks that succeeded
    pub succeeded: u64,
    /// Tasks that failed
    pub failed: u64,
    /// Objects left out of a restore request
    pub skipped: usize,
    /// Bytes moved
    pub bytes_transferred: u64,
    /// Wall-clock duration in seconds
    pub duration_secs: f64,
}

/// One failed task
#[derive(Debug, Serialize)]
pub struct FailureJson {
    /// Logical path of the task
    pub path: String,
    /// Error kind
    pub kind: String,
    /// Error message
    pub message: String,
}

/// Overall result
#[derive(Debug, Serialize)]
pub struct RunResult {
    /// Whether every task succeeded
    pub success: bool,
    /// Process exit code
    pub exit_code: u8,
}

impl SyncResultJson {
    /// Build the JSON view of a report
    pub fn from_report(report: &SyncReport) -> Self {
        let stats = &report.transfer.stats;
        let success = report.is_success();

        Self {
            metadata: RunMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                run_id: report.run_id.to_string(),
                mode: report.mode,
                dry_run: report.dry_run,
                timestamp: chrono::Utc::now().to_rfc3339(),
            },
            stats: StatsJson {
                planned: report.planned.len() as u64,
                succeeded: stats.succeeded,
                failed: stats.failed,
                skipped: report.skipped,
                bytes_transferred: stats.bytes_transferred,
                duration_secs: report.duration.as_secs_f64(),
            },
            planned: report.planned.iter().map(ToString::to_string).collect(),
            failures: report
                .transfer
                .failures
                .iter()
                .map(|failure| FailureJson {
                    path: failure.logical_path.to_string(),
                    kind: format!("{:?}", failure.error.kind()),
                    message: failure.error.to_string(),
                })
                .collect(),
            result: RunResult {
                success,
                exit_code: if success { 0 } else { 1 },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coldsync_sync::TransferReport;
    use coldsync_types::LogicalPath;
    use std::time::Duration;

    fn report(dry_run: bool) -> SyncReport {
        SyncReport {
            run_id: uuid::Uuid::nil(),
            mode: SyncMode::BackupFlat,
            dry_run,
            planned: vec![
                LogicalPath::new("a/x.txt").unwrap(),
                LogicalPath::new("b.txt").unwrap(),
            ],
            skipped: 0,
            transfer: TransferReport::default(),
            duration: Duration::from_millis(250),
        }
    }

    #[test]
    fn test_dry_run_counts_planned_paths() {
        let json = SyncResultJson::from_report(&report(true));

        assert!(json.metadata.dry_run);
        assert_eq!(json.stats.planned, 2);
        assert_eq!(json.planned, vec!["a/x.txt", "b.txt"]);
        assert_eq!(json.stats.succeeded, 0);
        assert!(json.result.success);
        assert_eq!(json.result.exit_code, 0);
    }
}
