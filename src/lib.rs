//! # Ironbucket
//!
//! A **resumable record pipeline** that turns the objects of a cloud bucket into an
//! ordered stream of decoded records, split deterministically across cooperating
//! workers.
//!
//! ## Key Features
//!
//! - **Lazy paginated listing** - one store round-trip per exhausted page
//! - **Static work sharing** - each object belongs to exactly one worker, decided by a
//!   stable string hash with no coordination
//! - **Resumable per object** - persisted record counts are skipped on restart
//! - **Pluggable formats** - raw byte chunks, JSON Lines, Avro containers and Parquet
//!   (formats other than raw bytes are optional via feature flags)
//! - **Error tolerance** - stop on the first bad object, or skip it and carry on
//!
//! ## Quick Start
//!
//! ```
//! use ironbucket::io::cloud::{FakeObjectIO, FakeOffsetStore};
//! use ironbucket::testing::jsonl_lines;
//! use ironbucket::*;
//! use std::sync::Arc;
//!
//! # fn main() -> SourceResult<()> {
//! let store = FakeObjectIO::new();
//! store.put_object("bucket", "orders-0-1700000000.jsonl", jsonl_lines(3));
//!
//! let config = SourceConfig {
//!     bucket: "bucket".into(),
//!     input_format: InputFormat::Jsonl,
//!     ..Default::default()
//! };
//! let offsets = Arc::new(OffsetManager::new(Arc::new(FakeOffsetStore::new())));
//! let mut records = SourceRecordIterator::new(&config, Arc::new(store), offsets)?;
//!
//! let batch = records.poll_batch()?;
//! assert_eq!(batch.len(), 3);
//! assert_eq!(batch[0].topic, "orders");
//! assert_eq!(batch[0].partition, Some(0));
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Stores
//!
//! The pipeline talks to two external stores through the traits in [`io::cloud`]:
//! [`ObjectIO`](io::cloud::ObjectIO) lists and fetches objects, and
//! [`OffsetStorageReader`](io::cloud::OffsetStorageReader) returns progress persisted
//! by the host runtime. In-memory fakes of both are provided for tests.
//!
//! ### Offsets
//!
//! Progress is tracked per object under a [`PartitionKey`]. The [`OffsetManager`]
//! reads each key from the persisted store at most once and caches it afterwards. Every
//! emitted [`SourceRecord`] carries a snapshot of its object's offset for the host to
//! persist after delivery.
//!
//! ### Transformers
//!
//! A [`Transformer`] turns one object into a [`RecordStream`]: opened on first pull,
//! skipping records already delivered, and released on exhaustion, failure or drop.
//!
//! ## Feature Flags
//!
//! - `io-jsonl` - JSON Lines decoding
//! - `io-avro` - Avro object container decoding
//! - `io-parquet` - Parquet decoding via a local temp file
//!
//! All are enabled by default.

pub mod config;
pub mod error;
pub mod io;
pub mod offset;
pub mod source;
pub mod testing;
pub mod transform;

pub use config::{ErrorsTolerance, SourceConfig};
pub use error::{SourceError, SourceResult};
pub use offset::{OffsetEntry, OffsetManager, PartitionKey};
pub use source::{SourceRecord, SourceRecordIterator, TaskAssignment, TaskFilter};
pub use transform::{
    DecodedRecord, InputFormat, RecordStream, RecordValue, StreamSupplier, Transformer,
    TransformerConfig,
};
