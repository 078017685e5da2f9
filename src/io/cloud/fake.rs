//! Fake implementations for testing.
//!
//! These implementations use in-memory data structures to simulate the object store
//! and the offset store, making them ideal for unit testing without external
//! dependencies. Both record the calls made against them so tests can assert on
//! round-trips, and both can be told to fail.

use crate::io::cloud::traits::{
    CloudIOError, CloudResult, ErrorKind, ListObjectsPage, ListObjectsRequest, ObjectIO,
    ObjectStream, ObjectSummary, OffsetStorageReader, PropertyMap,
};
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// Type aliases for complex nested types
type BucketStorage = Arc<Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>>;
type OffsetStorage = Arc<Mutex<Vec<(PropertyMap, PropertyMap)>>>;

/// Page size used when a request does not ask for one, matching S3's default.
const DEFAULT_MAX_KEYS: usize = 1000;
const TOKEN_PREFIX: &str = "after:";

// ============================================================================
// FakeObjectIO
// ============================================================================

#[derive(Clone)]
pub struct FakeObjectIO {
    storage: BucketStorage,
    list_log: Arc<Mutex<Vec<ListObjectsRequest>>>,
    get_log: Arc<Mutex<Vec<String>>>,
    list_failures: Arc<AtomicUsize>,
    get_failures: Arc<Mutex<HashMap<String, ErrorKind>>>,
    opened: Arc<AtomicUsize>,
    closed: Arc<AtomicUsize>,
}

impl FakeObjectIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            storage: Arc::new(Mutex::new(HashMap::new())),
            list_log: Arc::new(Mutex::new(Vec::new())),
            get_log: Arc::new(Mutex::new(Vec::new())),
            list_failures: Arc::new(AtomicUsize::new(0)),
            get_failures: Arc::new(Mutex::new(HashMap::new())),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stores an object, replacing any previous body under the same key.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the storage is poisoned.
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) {
        self.storage
            .lock()
            .expect("storage mutex poisoned")
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.into());
    }

    /// Every listing request received so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the request log is poisoned.
    #[must_use]
    pub fn list_requests(&self) -> Vec<ListObjectsRequest> {
        self.list_log.lock().expect("list log mutex poisoned").clone()
    }

    /// Every object key fetched so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the request log is poisoned.
    #[must_use]
    pub fn get_requests(&self) -> Vec<String> {
        self.get_log.lock().expect("get log mutex poisoned").clone()
    }

    /// Makes the next `count` listing calls fail with a network error.
    pub fn fail_next_lists(&self, count: usize) {
        self.list_failures.store(count, Ordering::SeqCst);
    }

    /// Makes the next fetch of `key` fail with a network error.
    pub fn fail_next_get(&self, key: &str) {
        self.fail_next_get_with(key, ErrorKind::Network);
    }

    /// Makes the next fetch of `key` fail with an error of `kind`.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the failure set is poisoned.
    pub fn fail_next_get_with(&self, key: &str, kind: ErrorKind) {
        self.get_failures
            .lock()
            .expect("failure mutex poisoned")
            .insert(key.to_string(), kind);
    }

    /// Number of object streams handed out.
    #[must_use]
    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of object streams that have been dropped.
    #[must_use]
    pub fn closed_streams(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for FakeObjectIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectIO for FakeObjectIO {
    fn list_objects(&self, request: &ListObjectsRequest) -> CloudResult<ListObjectsPage> {
        self.list_log
            .lock()
            .expect("list log mutex poisoned")
            .push(request.clone());

        if self
            .list_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CloudIOError::new(
                ErrorKind::Network,
                format!("Listing of {} failed", request.bucket),
            ));
        }

        if request.continuation_token.is_some() && request.start_after.is_some() {
            return Err(CloudIOError::new(
                ErrorKind::InvalidInput,
                "continuation token and start-after are mutually exclusive",
            ));
        }

        let after = match &request.continuation_token {
            Some(token) => Some(token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::InvalidInput,
                    format!("Malformed continuation token {token}"),
                )
            })?),
            None => request.start_after.as_deref(),
        };

        let storage = self.storage.lock().expect("storage mutex poisoned");
        let Some(bucket) = storage.get(&request.bucket) else {
            return Err(CloudIOError::new(
                ErrorKind::NotFound,
                format!("Bucket {} not found", request.bucket),
            ));
        };

        let max_keys = match request.max_keys {
            0 => DEFAULT_MAX_KEYS,
            n => n as usize,
        };
        let mut matching = bucket
            .iter()
            .filter(|(key, _)| {
                request
                    .prefix
                    .as_deref()
                    .is_none_or(|prefix| key.starts_with(prefix))
            })
            .filter(|(key, _)| after.is_none_or(|after| key.as_str() > after));

        let objects: Vec<ObjectSummary> = matching
            .by_ref()
            .take(max_keys)
            .map(|(key, data)| ObjectSummary::new(key.clone(), data.len() as u64))
            .collect();
        let truncated = matching.next().is_some();
        drop(storage);

        let next_continuation_token = if truncated {
            objects.last().map(|last| format!("{TOKEN_PREFIX}{}", last.key))
        } else {
            None
        };
        Ok(ListObjectsPage {
            objects,
            next_continuation_token,
        })
    }

    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<ObjectStream> {
        self.get_log
            .lock()
            .expect("get log mutex poisoned")
            .push(key.to_string());

        let failure = self
            .get_failures
            .lock()
            .expect("failure mutex poisoned")
            .remove(key);
        if let Some(kind) = failure {
            return Err(CloudIOError::new(kind, format!("Fetch of {bucket}/{key} failed")));
        }

        let storage = self.storage.lock().expect("storage mutex poisoned");
        let data = storage
            .get(bucket)
            .and_then(|b| b.get(key))
            .cloned()
            .ok_or_else(|| {
                CloudIOError::new(
                    ErrorKind::NotFound,
                    format!("Object {bucket}/{key} not found"),
                )
            })?;
        drop(storage);

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(TrackedStream {
            inner: Cursor::new(data),
            closed: Arc::clone(&self.closed),
        }))
    }
}

/// Object body that reports its release back to the owning fake.
struct TrackedStream {
    inner: Cursor<Vec<u8>>,
    closed: Arc<AtomicUsize>,
}

impl Read for TrackedStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Drop for TrackedStream {
    fn drop(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// FakeOffsetStore
// ============================================================================

#[derive(Clone, Default)]
pub struct FakeOffsetStore {
    offsets: OffsetStorage,
    queries: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl FakeOffsetStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Persists `properties` under the `partition` identity map.
    ///
    /// # Panics
    ///
    /// Panics if the mutex protecting the offsets is poisoned.
    pub fn put_offset(&self, partition: PropertyMap, properties: PropertyMap) {
        let mut offsets = self.offsets.lock().expect("offsets mutex poisoned");
        offsets.retain(|(existing, _)| existing != &partition);
        offsets.push((partition, properties));
    }

    /// Makes the next `count` lookups fail with a network error.
    pub fn fail_next_offsets(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Number of lookups served so far, failed ones included.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

impl OffsetStorageReader for FakeOffsetStore {
    fn offset(&self, partition: &PropertyMap) -> CloudResult<Option<PropertyMap>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(CloudIOError::new(ErrorKind::Network, "Offset lookup failed"));
        }
        Ok(self
            .offsets
            .lock()
            .expect("offsets mutex poisoned")
            .iter()
            .find(|(existing, _)| existing == partition)
            .map(|(_, properties)| properties.clone()))
    }
}
