//! Remote inventory
//!
//! Listing is exhaustive: pages are fetched one after another until the store
//! reports no continuation, and any inconsistency in pagination aborts the
//! run rather than yielding a partial inventory.

use crate::path::PathMapper;
use coldsync_types::{Error, LogicalPath, ObjectStore, RemoteEntry, Result, Timestamp};
use std::collections::{btree_map, BTreeMap, HashSet};
use tracing::{debug, info, warn};

/// Enumerates the objects of one bucket
pub struct RemoteInventory<'a> {
    store: &'a dyn ObjectStore,
    bucket: &'a str,
}

impl<'a> RemoteInventory<'a> {
    /// Create an inventory over `bucket`
    pub fn new(store: &'a dyn ObjectStore, bucket: &'a str) -> Self {
        Self { store, bucket }
    }

    /// Every object whose key starts with `prefix`, across all pages
    pub async fn list_entries(&self, prefix: &str) -> Result<Vec<RemoteEntry>> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;
        let mut seen: HashSet<String> = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = self
                .store
                .list_page(self.bucket, prefix, continuation.clone())
                .await
                .map_err(|e| match e {
                    Error::Listing { .. } => e,
                    other => Error::listing(prefix, other.to_string()),
                })?;
            pages += 1;
            entries.extend(page.entries);

            match (page.next_token, page.truncated) {
                (Some(token), _) => {
                    if !seen.insert(token.clone()) {
                        return Err(Error::listing(
                            prefix,
                            format!("continuation token repeated after page {}", pages),
                        ));
                    }
                    continuation = Some(token);
                }
                (None, true) => {
                    return Err(Error::listing(
                        prefix,
                        format!("page {} is truncated but has no continuation token", pages),
                    ));
                }
                (None, false) => break,
            }
        }

        debug!(
            "Listed {} objects in {} pages under {}:{}",
            entries.len(),
            pages,
            self.bucket,
            prefix
        );
        Ok(entries)
    }

    /// Entries whose keys map to a logical path under `mapper`, paired with it.
    ///
    /// Keys that do not map are skipped with a warning.
    pub async fn list_mapped(
        &self,
        mapper: &PathMapper,
    ) -> Result<Vec<(LogicalPath, RemoteEntry)>> {
        let entries = self.list_entries(&mapper.list_prefix()).await?;
        let mut mapped = Vec::with_capacity(entries.len());
        let mut skipped = 0usize;

        for entry in entries {
            match mapper.logical_from_key(&entry.key) {
                Ok(logical) => mapped.push((logical, entry)),
                Err(e) => {
                    warn!("Skipping remote object: {}", e);
                    skipped += 1;
                }
            }
        }

        info!(
            "Found {} objects remotely under {}:{}",
            mapped.len(),
            self.bucket,
            mapper.prefix()
        );
        if skipped > 0 {
            warn!(
                "{} remote objects did not match the {} layout and were ignored",
                skipped,
                mapper.layout()
            );
        }
        Ok(mapped)
    }

    /// One entry per logical path.
    ///
    /// Two keys can normalise to one logical path; the newest one wins.
    pub async fn list_newest(
        &self,
        mapper: &PathMapper,
    ) -> Result<BTreeMap<LogicalPath, RemoteEntry>> {
        let mut newest: BTreeMap<LogicalPath, RemoteEntry> = BTreeMap::new();
        for (logical, entry) in self.list_mapped(mapper).await? {
            match newest.entry(logical) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(entry);
                }
                btree_map::Entry::Occupied(mut slot) => {
                    debug!(
                        "{} and {} both map to {}",
                        slot.get().key,
                        entry.key,
                        slot.key()
                    );
                    if entry.last_modified > slot.get().last_modified {
                        slot.insert(entry);
                    }
                }
            }
        }
        Ok(newest)
    }

    /// Logical path to last-modified timestamp
    pub async fn list(&self, mapper: &PathMapper) -> Result<BTreeMap<LogicalPath, Timestamp>> {
        Ok(self
            .list_newest(mapper)
            .await?
            .into_iter()
            .map(|(logical, entry)| (logical, entry.last_modified))
            .collect())
    }
}
