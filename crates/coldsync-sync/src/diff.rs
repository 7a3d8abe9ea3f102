//! Staleness comparison between local and remote inventories

use coldsync_types::{LogicalPath, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Why a path needs transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeType {
    /// No remote counterpart
    Added,
    /// Remote copy is strictly older than the local timestamp
    Modified,
}

/// One planned path with the reason it was planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChange {
    /// Logical path to transfer
    pub path: LogicalPath,
    /// Reason for the transfer
    pub change_type: ChangeType,
}

/// Computes the set of paths that need uploading
#[derive(Debug, Default, Clone, Copy)]
pub struct DiffPlanner;

impl DiffPlanner {
    /// Every local path that is absent remotely or whose remote timestamp is
    /// strictly older, in logical path order.
    ///
    /// Equal timestamps count as up to date, so a second run over an
    /// unchanged tree plans nothing.
    pub fn plan_changes(
        remote: &BTreeMap<LogicalPath, Timestamp>,
        local: &BTreeMap<LogicalPath, Timestamp>,
    ) -> Vec<PlannedChange> {
        let changes: Vec<PlannedChange> = local
            .iter()
            .filter_map(|(path, local_mtime)| {
                let change_type = match remote.get(path) {
                    None => ChangeType::Added,
                    Some(remote_mtime) if remote_mtime < local_mtime => ChangeType::Modified,
                    Some(_) => return None,
                };
                Some(PlannedChange {
                    path: path.clone(),
                    change_type,
                })
            })
            .collect();

        debug!(
            "Planned {} of {} local entries against {} remote entries",
            changes.len(),
            local.len(),
            remote.len()
        );
        changes
    }
}
