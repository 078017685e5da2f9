//! Per-object progress tracking for resumable iteration.
//!
//! Every object the pipeline reads is tracked under a [`PartitionKey`]: the bucket,
//! the destination topic and partition, and the object key. The progress stored under
//! that key is an [`OffsetEntry`], which counts the records already delivered for the
//! object and may carry connector-defined extra properties.
//!
//! The [`OffsetManager`] is a read-through cache in front of the offsets the host
//! runtime has persisted:
//!
//! - the first [`get`](OffsetManager::get) for a key queries the persisted store once,
//!   later lookups are served from memory
//! - [`update`](OffsetManager::update) merges an entry's current properties back into
//!   the cache after records have been consumed
//!
//! ```
//! use ironbucket::io::cloud::FakeOffsetStore;
//! use ironbucket::offset::{OffsetManager, PartitionKey};
//! use std::sync::Arc;
//!
//! # fn main() -> ironbucket::SourceResult<()> {
//! let manager = OffsetManager::new(Arc::new(FakeOffsetStore::new()));
//! let key = PartitionKey::new("bucket", "topic", Some(0), "topic-00-1.txt");
//!
//! let mut entry = manager.get_entry(&key)?;
//! assert_eq!(entry.record_count(), 0);
//! entry.increment_record_count();
//! manager.update(&entry);
//!
//! assert_eq!(manager.get_entry(&key)?.record_count(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::{SourceError, SourceResult};
use crate::io::cloud::{OffsetStorageReader, PropertyMap};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub const BUCKET: &str = "bucket";
pub const OBJECT_KEY: &str = "objectKey";
pub const TOPIC: &str = "topic";
pub const PARTITION: &str = "partition";
pub const RECORD_COUNT: &str = "recordCount";

/// Properties an entry owns; they cannot be written through [`OffsetEntry::set_property`].
pub const RESTRICTED_KEYS: [&str; 5] = [BUCKET, OBJECT_KEY, TOPIC, PARTITION, RECORD_COUNT];

/// Identity under which the progress of one object is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey {
    pub bucket: String,
    pub topic: String,
    pub partition: Option<u32>,
    pub object_key: String,
}

impl PartitionKey {
    pub fn new(
        bucket: impl Into<String>,
        topic: impl Into<String>,
        partition: Option<u32>,
        object_key: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            topic: topic.into(),
            partition,
            object_key: object_key.into(),
        }
    }

    /// Canonical map form, as used to address the persisted offset store.
    #[must_use]
    pub fn partition_map(&self) -> PropertyMap {
        PropertyMap::from([
            (BUCKET.to_string(), Value::from(self.bucket.as_str())),
            (TOPIC.to_string(), Value::from(self.topic.as_str())),
            (PARTITION.to_string(), Value::from(self.partition)),
            (OBJECT_KEY.to_string(), Value::from(self.object_key.as_str())),
        ])
    }
}

/// Progress of one object: how many records have been consumed, plus free-form extras.
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetEntry {
    key: PartitionKey,
    record_count: u64,
    extra: PropertyMap,
}

impl OffsetEntry {
    /// A zero-valued entry for an object that has never been read.
    #[must_use]
    pub fn new(key: PartitionKey) -> Self {
        Self {
            key,
            record_count: 0,
            extra: PropertyMap::new(),
        }
    }

    /// Rebuilds an entry from persisted properties.
    ///
    /// `recordCount` defaults to zero when absent. Properties outside the restricted set
    /// are carried over unchanged.
    ///
    /// # Errors
    /// Returns [`SourceError::OffsetReconstruction`] if an identity field is missing or
    /// has the wrong type, or if `recordCount` is not a non-negative integer.
    pub fn from_properties(mut properties: PropertyMap) -> SourceResult<Self> {
        let bucket = take_string(&mut properties, BUCKET)?;
        let topic = take_string(&mut properties, TOPIC)?;
        let object_key = take_string(&mut properties, OBJECT_KEY)?;
        let partition = match properties.remove(PARTITION) {
            None => {
                return Err(SourceError::reconstruction(format!(
                    "missing '{PARTITION}' property"
                )));
            }
            Some(Value::Null) => None,
            Some(value) => Some(
                value
                    .as_u64()
                    .and_then(|p| u32::try_from(p).ok())
                    .ok_or_else(|| {
                        SourceError::reconstruction(format!(
                            "'{PARTITION}' must be a partition number, got {value}"
                        ))
                    })?,
            ),
        };
        let record_count = match properties.remove(RECORD_COUNT) {
            None | Some(Value::Null) => 0,
            Some(value) => value.as_u64().ok_or_else(|| {
                SourceError::reconstruction(format!(
                    "'{RECORD_COUNT}' must be a non-negative integer, got {value}"
                ))
            })?,
        };
        Ok(Self {
            key: PartitionKey {
                bucket,
                topic,
                partition,
                object_key,
            },
            record_count,
            extra: properties,
        })
    }

    #[must_use]
    pub fn partition_key(&self) -> &PartitionKey {
        &self.key
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.key.topic
    }

    #[must_use]
    pub fn partition(&self) -> Option<u32> {
        self.key.partition
    }

    #[must_use]
    pub fn object_key(&self) -> &str {
        &self.key.object_key
    }

    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Number of records a resumed read must pass over before delivering anything.
    #[must_use]
    pub fn skip_records(&self) -> u64 {
        self.record_count
    }

    pub fn increment_record_count(&mut self) {
        self.record_count += 1;
    }

    /// Restarts the count for a replay of the object from its first record.
    pub(crate) fn rewind_record_count(&mut self) {
        self.record_count = 0;
    }

    /// Raises the count to `floor` if a replay ended below it.
    pub(crate) fn restore_record_count(&mut self, floor: u64) {
        self.record_count = self.record_count.max(floor);
    }

    /// Reads a property, including the identity fields and the record count.
    #[must_use]
    pub fn get_property(&self, name: &str) -> Option<Value> {
        match name {
            RECORD_COUNT => Some(Value::from(self.record_count)),
            BUCKET | TOPIC | PARTITION | OBJECT_KEY => self.key.partition_map().remove(name),
            _ => self.extra.get(name).cloned(),
        }
    }

    /// Sets a connector-defined property, overwriting any previous value.
    ///
    /// # Errors
    /// Returns [`SourceError::RestrictedProperty`] for any of [`RESTRICTED_KEYS`].
    pub fn set_property(&mut self, name: impl Into<String>, value: Value) -> SourceResult<()> {
        let name = name.into();
        if RESTRICTED_KEYS.contains(&name.as_str()) {
            return Err(SourceError::RestrictedProperty(name));
        }
        self.extra.insert(name, value);
        Ok(())
    }

    /// Snapshot of every property, in the form persisted by the host runtime.
    #[must_use]
    pub fn properties(&self) -> PropertyMap {
        let mut properties = self.extra.clone();
        properties.extend(self.key.partition_map());
        properties.insert(RECORD_COUNT.to_string(), Value::from(self.record_count));
        properties
    }
}

fn take_string(properties: &mut PropertyMap, name: &str) -> SourceResult<String> {
    match properties.remove(name) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Err(SourceError::reconstruction(format!(
            "'{name}' must be a string, got {other}"
        ))),
        None => Err(SourceError::reconstruction(format!(
            "missing '{name}' property"
        ))),
    }
}

type Slot = Arc<Mutex<Option<PropertyMap>>>;

/// Read-through cache of offset properties, one slot per [`PartitionKey`].
///
/// Each key gets its own slot lock, so a slow backing-store query for one key never
/// blocks lookups of other keys, and concurrent lookups of the same key share a
/// single query.
pub struct OffsetManager {
    store: Arc<dyn OffsetStorageReader>,
    slots: Mutex<HashMap<PartitionKey, Slot>>,
}

impl OffsetManager {
    pub fn new(store: Arc<dyn OffsetStorageReader>) -> Self {
        Self {
            store,
            slots: Mutex::new(HashMap::new()),
        }
    }

    fn slot(&self, key: &PartitionKey) -> Slot {
        let mut slots = self.slots.lock().expect("offset slots mutex poisoned");
        Arc::clone(slots.entry(key.clone()).or_default())
    }

    /// Returns the entry for `key`, reading the persisted store on first use.
    ///
    /// When nothing has been persisted for the key, the entry is zero-valued and seeded
    /// with the key's own fields. Otherwise `constructor` rebuilds it from the cached
    /// properties.
    ///
    /// # Errors
    /// Returns [`SourceError::Store`] if the persisted store cannot be queried (the next
    /// call queries again), or whatever `constructor` rejects.
    ///
    /// # Panics
    /// Panics if a cache mutex is poisoned.
    pub fn get<F>(&self, key: &PartitionKey, constructor: F) -> SourceResult<OffsetEntry>
    where
        F: FnOnce(PropertyMap) -> SourceResult<OffsetEntry>,
    {
        let properties = self.cached_or_load(key)?;
        match properties {
            Some(properties) => constructor(properties),
            None => Ok(OffsetEntry::new(key.clone())),
        }
    }

    /// Cached properties for `key`, querying the store on a miss. `None` when the store
    /// had nothing for a key seen for the first time.
    ///
    /// The slot lock is released before the caller reconstructs anything.
    fn cached_or_load(&self, key: &PartitionKey) -> SourceResult<Option<PropertyMap>> {
        let slot = self.slot(key);
        let mut cached = slot.lock().expect("offset slot mutex poisoned");
        if let Some(properties) = cached.as_ref() {
            return Ok(Some(properties.clone()));
        }

        let partition_map = key.partition_map();
        match self.store.offset(&partition_map)? {
            Some(properties) if !properties.is_empty() => {
                debug!(object_key = %key.object_key, ?properties, "loaded persisted offset");
                *cached = Some(properties.clone());
                Ok(Some(properties))
            }
            _ => {
                debug!(object_key = %key.object_key, "no persisted offset");
                *cached = Some(partition_map);
                Ok(None)
            }
        }
    }

    /// [`get`](Self::get) using [`OffsetEntry::from_properties`] as the constructor.
    ///
    /// # Errors
    /// See [`get`](Self::get).
    pub fn get_entry(&self, key: &PartitionKey) -> SourceResult<OffsetEntry> {
        self.get(key, OffsetEntry::from_properties)
    }

    /// Merges the entry's current properties into the cache slot for its key.
    ///
    /// # Panics
    /// Panics if a cache mutex is poisoned.
    pub fn update(&self, entry: &OffsetEntry) {
        let slot = self.slot(entry.partition_key());
        let mut cached = slot.lock().expect("offset slot mutex poisoned");
        match cached.as_mut() {
            Some(properties) => properties.extend(entry.properties()),
            None => *cached = Some(entry.properties()),
        }
    }
}
