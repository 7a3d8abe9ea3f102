//! In-memory object store
//!
//! Behaves like a single-region S3 endpoint for the operations coldsync uses:
//! keys are returned in lexicographic order, listings are paginated, and puts
//! stamp the object with the current time. Failures can be injected per key
//! to exercise error paths.

use async_trait::async_trait;
use coldsync_types::{
    Error, ListPage, ObjectBody, ObjectStore, RemoteEntry, RestoreAck, RestoreTier, Result,
    StorageClass,
};
use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

/// Default number of keys per listing page, matching S3
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// A stored object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object payload
    pub data: Vec<u8>,
    /// Last-modified timestamp
    pub last_modified: SystemTime,
    /// Storage class, if one was set
    pub storage_class: Option<StorageClass>,
}

/// A restore request received by the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRecord {
    /// Bucket name
    pub bucket: String,
    /// Object key
    pub key: String,
    /// Requested availability in days
    pub days: u32,
    /// Requested retrieval tier
    pub tier: RestoreTier,
}

#[derive(Debug, Default)]
struct State {
    objects: BTreeMap<(String, String), StoredObject>,
    fail_puts: HashSet<String>,
    fail_gets: HashSet<String>,
    fail_restores: HashSet<String>,
    fail_listing: bool,
    drop_token_after_page: Option<usize>,
    restores: Vec<RestoreRecord>,
    put_count: usize,
}

/// Thread-safe in-memory store
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
}

impl MemoryStore {
    /// Create an empty store with S3's page size
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store returning at most `page_size` keys per page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: page_size.max(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an object with an explicit timestamp
    pub fn insert(&self, bucket: &str, key: &str, data: Vec<u8>, last_modified: SystemTime) {
        self.insert_with_class(bucket, key, data, last_modified, None);
    }

    /// Insert an object with an explicit timestamp and storage class
    pub fn insert_with_class(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        last_modified: SystemTime,
        storage_class: Option<StorageClass>,
    ) {
        self.state().objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                last_modified,
                storage_class,
            },
        );
    }

    /// Fetch a stored object
    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// All keys in `bucket`, in order
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.state()
            .objects
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }

    /// Restore requests received so far
    pub fn restore_requests(&self) -> Vec<RestoreRecord> {
        self.state().restores.clone()
    }

    /// Number of successful puts
    pub fn put_count(&self) -> usize {
        self.state().put_count
    }

    /// Make puts to `key` fail
    pub fn fail_put(&self, key: &str) {
        self.state().fail_puts.insert(key.to_string());
    }

    /// Make reads of `key` fail
    pub fn fail_get(&self, key: &str) {
        self.state().fail_gets.insert(key.to_string());
    }

    /// Make restore requests for `key` fail
    pub fn fail_restore(&self, key: &str) {
        self.state().fail_restores.insert(key.to_string());
    }

    /// Make every listing request fail
    pub fn fail_listing(&self) {
        self.state().fail_listing = true;
    }

    /// Report page `page` (zero-based) as truncated but omit its continuation token
    pub fn drop_token_after_page(&self, page: usize) {
        self.state().drop_token_after_page = Some(page);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let state = self.state();
        if state.fail_listing {
            return Err(Error::listing(prefix, "injected listing failure"));
        }

        // The token is the index of the first key on the requested page
        let start = match &continuation {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| Error::listing(prefix, format!("Invalid continuation token '{}'", token)))?,
            None => 0,
        };

        let matching: Vec<(&String, &StoredObject)> = state
            .objects
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), object)| (k, object))
            .collect();

        let end = (start + self.page_size).min(matching.len());
        let entries = matching
            .get(start..end)
            .unwrap_or_default()
            .iter()
            .map(|(key, object)| RemoteEntry {
                key: (*key).clone(),
                last_modified: object.last_modified,
                storage_class: object.storage_class,
            })
            .collect();

        let truncated = end < matching.len();
        let page_index = start / self.page_size;
        let next_token = if truncated && state.drop_token_after_page != Some(page_index) {
            Some(end.to_string())
        } else {
            None
        };

        Ok(ListPage {
            entries,
            next_token,
            truncated,
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody> {
        let state = self.state();
        if state.fail_gets.contains(key) {
            return Err(Error::transfer(key, "injected read failure"));
        }
        let object = state
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .ok_or_else(|| Error::transfer(key, "NoSuchKey: the specified key does not exist"))?;
        Ok(Box::pin(Cursor::new(object.data.clone())))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        storage_class: Option<StorageClass>,
    ) -> Result<()> {
        let mut state = self.state();
        if state.fail_puts.contains(key) {
            return Err(Error::transfer(key, "injected write failure"));
        }
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body,
                last_modified: SystemTime::now(),
                storage_class,
            },
        );
        state.put_count += 1;
        Ok(())
    }

    async fn restore_object(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RestoreTier,
    ) -> Result<RestoreAck> {
        let mut state = self.state();
        if state.fail_restores.contains(key) {
            return Err(Error::transfer(key, "injected restore failure"));
        }
        if !state
            .objects
            .contains_key(&(bucket.to_string(), key.to_string()))
        {
            return Err(Error::transfer(key, "NoSuchKey: the specified key does not exist"));
        }

        let already = state
            .restores
            .iter()
            .any(|record| record.bucket == bucket && record.key == key);
        state.restores.push(RestoreRecord {
            bucket: bucket.to_string(),
            key: key.to_string(),
            days,
            tier,
        });

        Ok(if already {
            RestoreAck::AlreadyInProgress
        } else {
            RestoreAck::Initiated
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::{Duration, UNIX_EPOCH};
    use tokio::io::AsyncReadExt;

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    #[rstest]
    #[case(1, 5)]
    #[case(2, 3)]
    #[case(5, 1)]
    #[case(1000, 1)]
    #[tokio::test]
    async fn test_pagination(#[case] page_size: usize, #[case] expected_pages: usize) {
        let store = MemoryStore::with_page_size(page_size);
        for i in 0..5 {
            store.insert("b", &format!("p/{i}"), vec![], at(i));
        }

        let mut token = None;
        let mut pages = 0;
        let mut keys = Vec::new();
        loop {
            let page = store.list_page("b", "p/", token).await.unwrap();
            pages += 1;
            keys.extend(page.entries.into_iter().map(|e| e.key));
            assert_eq!(page.truncated, page.next_token.is_some());
            match page.next_token {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        assert_eq!(pages, expected_pages);
        assert_eq!(keys, vec!["p/0", "p/1", "p/2", "p/3", "p/4"]);
    }

    #[tokio::test]
    async fn test_listing_respects_bucket_and_prefix() {
        let store = MemoryStore::new();
        store.insert("b", "backups/a", vec![], at(1));
        store.insert("b", "backups2/a", vec![], at(1));
        store.insert("other", "backups/b", vec![], at(1));

        let page = store.list_page("b", "backups/", None).await.unwrap();
        let keys: Vec<_> = page.entries.into_iter().map(|e| e.key).collect();
        assert_eq!(keys, vec!["backups/a"]);
    }

    #[tokio::test]
    async fn test_dropped_token_reports_truncation() {
        let store = MemoryStore::with_page_size(1);
        store.insert("b", "k1", vec![], at(1));
        store.insert("b", "k2", vec![], at(1));
        store.drop_token_after_page(0);

        let page = store.list_page("b", "", None).await.unwrap();
        assert!(page.truncated);
        assert!(page.next_token.is_none());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = MemoryStore::new();
        let before = SystemTime::now();
        store
            .put_object("b", "k", b"payload".to_vec(), Some(StorageClass::Glacier))
            .await
            .unwrap();

        let stored = store.object("b", "k").unwrap();
        assert!(stored.last_modified >= before);
        assert_eq!(stored.storage_class, Some(StorageClass::Glacier));
        assert_eq!(store.put_count(), 1);

        let mut body = store.get_object("b", "k").await.unwrap();
        let mut data = Vec::new();
        body.read_to_end(&mut data).await.unwrap();
        assert_eq!(data, b"payload");
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.insert("b", "k", vec![1], at(1));
        store.fail_put("k");
        store.fail_get("k");

        assert!(store.put_object("b", "k", vec![], None).await.is_err());
        assert!(store.get_object("b", "k").await.is_err());
        assert!(store.get_object("b", "missing").await.is_err());
    }

    #[tokio::test]
    async fn test_repeated_restore_is_in_progress() {
        let store = MemoryStore::new();
        store.insert("b", "k", vec![], at(1));

        let first = store
            .restore_object("b", "k", 2, RestoreTier::Standard)
            .await
            .unwrap();
        let second = store
            .restore_object("b", "k", 2, RestoreTier::Standard)
            .await
            .unwrap();

        assert_eq!(first, RestoreAck::Initiated);
        assert_eq!(second, RestoreAck::AlreadyInProgress);
        assert_eq!(store.restore_requests().len(), 2);
    }
}
