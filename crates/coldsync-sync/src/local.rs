//! Local inventory
//!
//! Walks the backup root and assigns every file, or every group directory,
//! the timestamp that decides whether it is stale remotely.

use coldsync_types::{Error, GroupDepth, LogicalPath, Result, Timestamp};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Unit of comparison for a walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    /// One entry per regular file, keyed by its own mtime
    Flat,
    /// One entry per directory at this depth, keyed by the newest file beneath it
    Grouped(GroupDepth),
}

/// Outcome of one pass over the tree
#[derive(Debug, Default)]
struct Scan {
    inventory: BTreeMap<LogicalPath, Timestamp>,
    files: usize,
    uncovered: usize,
}

/// Walks one local root
#[derive(Debug, Clone)]
pub struct LocalInventory {
    root: PathBuf,
    granularity: Granularity,
}

impl LocalInventory {
    /// Create an inventory of `root`
    pub fn new<P: Into<PathBuf>>(root: P, granularity: Granularity) -> Self {
        Self {
            root: root.into(),
            granularity,
        }
    }

    /// Root being walked
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the tree.
    ///
    /// An unreadable root is an [`Error::Walk`]; unreadable entries below it
    /// are skipped with a warning.
    pub fn walk(&self) -> Result<BTreeMap<LogicalPath, Timestamp>> {
        let scan = self.scan()?;

        if scan.uncovered > 0 {
            if let Granularity::Grouped(depth) = self.granularity {
                warn!(
                    "{} files sit at or above grouping depth {} and are not part of any group",
                    scan.uncovered,
                    depth.get()
                );
            }
        }

        debug!("Walked {} files under {}", scan.files, self.root.display());
        info!(
            "Found {} local entries under {}",
            scan.inventory.len(),
            self.root.display()
        );
        Ok(scan.inventory)
    }

    fn scan(&self) -> Result<Scan> {
        let metadata = std::fs::metadata(&self.root)
            .map_err(|e| Error::walk(&self.root, e.to_string()))?;
        if !metadata.is_dir() {
            return Err(Error::walk(&self.root, "not a directory"));
        }

        let mut scan = Scan::default();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(Error::walk(&self.root, e.to_string()));
                }
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }

            let Some(segments) = self.segments(entry.path()) else {
                warn!("Skipping non UTF-8 path: {}", entry.path().display());
                continue;
            };

            let mtime = match entry.metadata().map_err(|e| e.to_string()).and_then(|m| {
                m.modified().map_err(|e| e.to_string())
            }) {
                Ok(mtime) => mtime,
                Err(e) => {
                    warn!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };
            scan.files += 1;

            let key = match self.granularity {
                Granularity::Flat => segments.join("/"),
                Granularity::Grouped(depth) => {
                    if segments.len() <= depth.get() {
                        scan.uncovered += 1;
                        continue;
                    }
                    segments[..depth.get()].join("/")
                }
            };

            let logical = match LogicalPath::new(&key) {
                Ok(logical) => logical,
                Err(e) => {
                    warn!("Skipping local entry: {}", e);
                    continue;
                }
            };

            scan.inventory
                .entry(logical)
                .and_modify(|existing| {
                    if mtime > *existing {
                        *existing = mtime;
                    }
                })
                .or_insert(mtime);
        }

        Ok(scan)
    }

    fn segments<'p>(&self, path: &'p Path) -> Option<Vec<&'p str>> {
        path.strip_prefix(&self.root)
            .ok()?
            .components()
            .map(|component| component.as_os_str().to_str())
            .collect()
    }
}
