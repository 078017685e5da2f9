use crate::config::{ErrorsTolerance, SourceConfig};
use crate::error::{SourceError, SourceResult};
use crate::io::cloud::{ObjectIO, ObjectSummary, PropertyMap};
use crate::offset::{OffsetManager, PartitionKey};
use crate::source::lister::{ObjectLister, ObjectSummaryIter};
use crate::source::task::{TaskAssignment, TaskFilter};
use crate::source::template::FilenameTemplate;
use crate::transform::{RecordStream, RecordValue, StreamSupplier, Transformer};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// One record ready for delivery, with the offset to persist once it is delivered.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub topic: String,
    pub partition: Option<u32>,
    pub key: Option<Vec<u8>>,
    pub value: RecordValue,
    pub schema: Option<String>,
    /// Identity of the object the record came from.
    pub partition_map: PropertyMap,
    /// Progress of that object including this record.
    pub offset: PropertyMap,
}

impl SourceRecord {
    /// Object key the record was read from.
    #[must_use]
    pub fn object_key(&self) -> Option<&str> {
        self.partition_map
            .get(crate::offset::OBJECT_KEY)
            .and_then(|v| v.as_str())
    }
}

struct InFlight {
    summary: ObjectSummary,
    stream: RecordStream,
    key: Vec<u8>,
}

/// Drives listing, filtering, offset lookup and decoding for one worker.
///
/// Objects are processed one at a time in key order. When the listing runs out, the
/// next pull re-lists the bucket starting after the last key seen, so `None` means
/// "nothing new right now" rather than end of input.
///
/// Failure handling:
///
/// - object-store errors are returned as they happen. After a transient error (network,
///   timeout, throttling) the object is retried on the next pull; after any other store
///   error it is dropped for this run. A failed listing is restarted after the last key seen
/// - decode errors stop the iterator under [`ErrorsTolerance::None`]; under
///   [`ErrorsTolerance::All`] the object is marked failed and skipped
/// - offset reconstruction errors always stop the iterator
pub struct SourceRecordIterator {
    store: Arc<dyn ObjectIO>,
    lister: ObjectLister,
    listing: Option<ObjectSummaryIter>,
    last_key: Option<String>,
    filter: TaskFilter,
    offsets: Arc<OffsetManager>,
    transformer: Transformer,
    template: FilenameTemplate,
    target_topic: Option<String>,
    tolerance: ErrorsTolerance,
    max_poll_records: usize,
    current: Option<InFlight>,
    pending: Option<ObjectSummary>,
    deferred: Option<SourceError>,
    terminated: bool,
}

impl SourceRecordIterator {
    /// Builds the pipeline described by `config`.
    ///
    /// # Errors
    /// Returns [`SourceError::Config`] if the template does not compile or the input
    /// format is unavailable.
    pub fn new(
        config: &SourceConfig,
        store: Arc<dyn ObjectIO>,
        offsets: Arc<OffsetManager>,
    ) -> SourceResult<Self> {
        let assignment = TaskAssignment::resolve(config.task_id, config.max_tasks);
        let template = FilenameTemplate::compile(&config.file_name_template)?;
        let transformer = Transformer::from_config(config.input_format, &config.transformer)?;
        info!(
            bucket = %config.bucket,
            prefix = ?config.prefix,
            format = %config.input_format,
            worker_index = assignment.worker_index(),
            worker_count = assignment.worker_count(),
            tolerance = %config.errors_tolerance,
            "starting source record iterator"
        );

        Ok(Self {
            lister: ObjectLister::new(
                Arc::clone(&store),
                config.bucket.clone(),
                config.prefix.clone(),
                config.list_page_size(),
            ),
            store,
            listing: None,
            last_key: None,
            filter: TaskFilter::new(assignment),
            offsets,
            transformer,
            template,
            target_topic: config.target_topic.clone(),
            tolerance: config.errors_tolerance,
            max_poll_records: config.max_poll_records.max(1),
            current: None,
            pending: None,
            deferred: None,
            terminated: false,
        })
    }

    /// Excludes `keys` from processing, e.g. the failures of an earlier iterator.
    #[must_use]
    pub fn with_failed_keys(mut self, keys: impl IntoIterator<Item = String>) -> Self {
        self.filter = self.filter.with_failed_keys(keys);
        self
    }

    /// Keys skipped after a decode error under [`ErrorsTolerance::All`].
    #[must_use]
    pub fn failed_keys(&self) -> &HashSet<String> {
        self.filter.failed_keys()
    }

    #[must_use]
    pub fn offset_manager(&self) -> &Arc<OffsetManager> {
        &self.offsets
    }

    /// Whether a fatal error has stopped the iterator.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Collects up to `max_records` records.
    ///
    /// An error met after some records were collected is held back: the collected
    /// records are returned now and the error on the next call.
    ///
    /// # Errors
    /// See the type-level failure handling.
    pub fn poll(&mut self, max_records: usize) -> SourceResult<Vec<SourceRecord>> {
        if let Some(e) = self.deferred.take() {
            return Err(e);
        }
        let mut batch = Vec::new();
        while batch.len() < max_records {
            match self.next() {
                Some(Ok(record)) => batch.push(record),
                Some(Err(e)) if batch.is_empty() => return Err(e),
                Some(Err(e)) => {
                    self.deferred = Some(e);
                    break;
                }
                None => break,
            }
        }
        debug!(records = batch.len(), "poll complete");
        Ok(batch)
    }

    /// [`poll`](Self::poll) bounded by the configured `max_poll_records`.
    ///
    /// # Errors
    /// See [`poll`](Self::poll).
    pub fn poll_batch(&mut self) -> SourceResult<Vec<SourceRecord>> {
        self.poll(self.max_poll_records)
    }

    /// Releases the object in flight, if any. A later pull reopens that object and
    /// resumes after the last record returned.
    pub fn close(&mut self) {
        if let Some(mut in_flight) = self.current.take() {
            in_flight.stream.close();
            self.offsets.update(in_flight.stream.offset_entry());
            self.pending = Some(in_flight.summary);
        }
    }

    /// Queues `summary` for another attempt when `err` may clear up on its own.
    fn on_store_error(&mut self, summary: ObjectSummary, err: &SourceError) {
        match err {
            SourceError::Store(cause) if cause.is_transient() => {
                warn!(object_key = %summary.key, error = %err, "object will be retried");
                self.pending = Some(summary);
            }
            _ => warn!(object_key = %summary.key, error = %err, "dropping object"),
        }
    }

    /// Next accepted object, re-listing at most once per call.
    fn next_object(&mut self) -> SourceResult<Option<ObjectSummary>> {
        let mut listed = false;
        loop {
            if self.listing.is_none() {
                if listed {
                    return Ok(None);
                }
                self.listing = Some(self.lister.list(self.last_key.as_deref()));
                listed = true;
            }
            let Some(listing) = self.listing.as_mut() else {
                return Ok(None);
            };
            match listing.next() {
                Some(Ok(summary)) => {
                    self.last_key = Some(summary.key.clone());
                    if self.filter.accepts(&summary) {
                        return Ok(Some(summary));
                    }
                    debug!(object_key = %summary.key, size = summary.size, "object not accepted");
                }
                Some(Err(e)) => {
                    self.listing = None;
                    return Err(e.into());
                }
                None => self.listing = None,
            }
        }
    }

    /// Looks up the object's offset and prepares its record stream. Objects whose key
    /// does not fit the template are skipped.
    fn open_object(&mut self, summary: ObjectSummary) -> SourceResult<()> {
        let Some(fields) = self.template.parse(&summary.key) else {
            warn!(
                object_key = %summary.key,
                template = %self.template.as_str(),
                "object key does not match the file name template, skipping"
            );
            return Ok(());
        };
        let Some(topic) = self.target_topic.clone().or(fields.topic) else {
            warn!(object_key = %summary.key, "no destination topic for object, skipping");
            return Ok(());
        };

        let key = PartitionKey::new(
            self.lister.bucket(),
            topic,
            fields.partition,
            summary.key.clone(),
        );
        let entry = match self.offsets.get_entry(&key) {
            Ok(entry) => entry,
            Err(e @ SourceError::Store(_)) => {
                self.on_store_error(summary, &e);
                return Err(e);
            }
            Err(e) => {
                error!(object_key = %summary.key, error = %e, "cannot resume object");
                self.terminated = true;
                return Err(e);
            }
        };

        let store = Arc::clone(&self.store);
        let bucket = self.lister.bucket().to_string();
        let object_key = summary.key.clone();
        let supplier: StreamSupplier = Box::new(move || store.get_object(&bucket, &object_key));
        debug!(
            object_key = %summary.key,
            skip = entry.skip_records(),
            "streaming object"
        );

        self.current = Some(InFlight {
            key: self.transformer.key_data(&summary.key),
            stream: self.transformer.get_records(supplier, entry),
            summary,
        });
        Ok(())
    }

    fn on_stream_error(&mut self, in_flight: InFlight, err: SourceError) -> Option<SourceError> {
        let InFlight {
            summary,
            mut stream,
            ..
        } = in_flight;
        stream.close();

        if let SourceError::Store(_) = err {
            self.on_store_error(summary, &err);
            return Some(err);
        }
        match self.tolerance {
            ErrorsTolerance::None => {
                error!(object_key = %summary.key, error = %err, "stopping on decode error");
                self.terminated = true;
                Some(err)
            }
            ErrorsTolerance::All => {
                warn!(object_key = %summary.key, error = %err, "skipping object after decode error");
                self.filter.mark_failed(summary.key);
                None
            }
        }
    }
}

impl Iterator for SourceRecordIterator {
    type Item = SourceResult<SourceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.terminated {
                return None;
            }

            let Some(in_flight) = self.current.as_mut() else {
                let summary = match self.pending.take() {
                    Some(summary) => summary,
                    None => match self.next_object() {
                        Ok(Some(summary)) => summary,
                        Ok(None) => return None,
                        Err(e) => return Some(Err(e)),
                    },
                };
                if let Err(e) = self.open_object(summary) {
                    return Some(Err(e));
                }
                continue;
            };

            match in_flight.stream.next() {
                Some(Ok(decoded)) => {
                    let entry = in_flight.stream.offset_entry();
                    self.offsets.update(entry);
                    return Some(Ok(SourceRecord {
                        topic: entry.topic().to_string(),
                        partition: entry.partition(),
                        key: Some(in_flight.key.clone()),
                        value: decoded.value,
                        schema: decoded.schema,
                        partition_map: entry.partition_key().partition_map(),
                        offset: entry.properties(),
                    }));
                }
                Some(Err(e)) => {
                    if let Some(in_flight) = self.current.take()
                        && let Some(e) = self.on_stream_error(in_flight, e)
                    {
                        return Some(Err(e));
                    }
                }
                None => {
                    if let Some(in_flight) = self.current.take() {
                        self.offsets.update(in_flight.stream.offset_entry());
                        debug!(
                            object_key = %in_flight.summary.key,
                            record_count = in_flight.stream.offset_entry().record_count(),
                            "finished object"
                        );
                    }
                }
            }
        }
    }
}
