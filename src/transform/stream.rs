use super::{DecodedRecord, RecordDecoder, StreamSupplier, Transformer};
use crate::error::{SourceError, SourceResult};
use crate::offset::OffsetEntry;
use tracing::{debug, error};

enum State {
    Pending(StreamSupplier),
    Open(Box<dyn RecordDecoder>),
    Closed,
}

/// Single-pass sequence of the records of one object.
///
/// The object is fetched and the decoder opened on the first call to `next`. Records
/// already counted by the [`OffsetEntry`] are decoded and counted again, but not
/// yielded. Every record the decoder produces increments the entry, so after a full
/// pass its count equals the number of records in the object.
///
/// The object is released exactly once: when the decoder runs dry, when it fails, on
/// [`close`](Self::close), or when the stream is dropped. After release the stream
/// only yields `None`.
pub struct RecordStream {
    transformer: Transformer,
    state: State,
    entry: OffsetEntry,
    resume_from: u64,
}

impl RecordStream {
    pub(crate) fn new(transformer: Transformer, supplier: StreamSupplier, entry: OffsetEntry) -> Self {
        let resume_from = entry.record_count();
        Self {
            transformer,
            state: State::Pending(supplier),
            entry,
            resume_from,
        }
    }

    /// Progress of the object so far.
    #[must_use]
    pub fn offset_entry(&self) -> &OffsetEntry {
        &self.entry
    }

    /// Closes the stream and hands back its offset entry.
    #[must_use]
    pub fn into_offset_entry(mut self) -> OffsetEntry {
        self.close();
        let placeholder = OffsetEntry::new(self.entry.partition_key().clone());
        std::mem::replace(&mut self.entry, placeholder)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Releases the object. Idempotent.
    ///
    /// Decoder close failures are logged. The record count never ends below the value
    /// the stream was resumed from.
    pub fn close(&mut self) {
        if let State::Open(mut decoder) = std::mem::replace(&mut self.state, State::Closed) {
            if let Err(e) = decoder.close() {
                error!(object_key = %self.entry.object_key(), error = ?e, "failed to close decoder");
            }
            drop(decoder);
            debug!(
                object_key = %self.entry.object_key(),
                record_count = self.entry.record_count(),
                "closed object"
            );
        }
        self.entry.restore_record_count(self.resume_from);
    }

    fn open(&mut self) -> SourceResult<()> {
        let State::Pending(supplier) = std::mem::replace(&mut self.state, State::Closed) else {
            return Ok(());
        };
        let input = supplier()?;
        let decoder = self
            .transformer
            .open(input, &self.entry)
            .map_err(|e| SourceError::decode(self.entry.object_key(), e))?;

        self.resume_from = self.entry.record_count();
        self.entry.rewind_record_count();
        debug!(
            object_key = %self.entry.object_key(),
            format = %self.transformer.format(),
            skip = self.resume_from,
            "opened object"
        );
        self.state = State::Open(decoder);
        Ok(())
    }
}

impl Iterator for RecordStream {
    type Item = SourceResult<DecodedRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.state, State::Pending(_))
            && let Err(e) = self.open()
        {
            return Some(Err(e));
        }
        loop {
            let State::Open(decoder) = &mut self.state else {
                return None;
            };
            match decoder.next_record() {
                Ok(Some(record)) => {
                    self.entry.increment_record_count();
                    if self.entry.record_count() > self.resume_from {
                        return Some(Ok(record));
                    }
                }
                Ok(None) => {
                    self.close();
                    return None;
                }
                Err(e) => {
                    let err = SourceError::decode(self.entry.object_key(), e);
                    self.close();
                    return Some(Err(err));
                }
            }
        }
    }
}

impl Drop for RecordStream {
    fn drop(&mut self) {
        self.close();
    }
}
