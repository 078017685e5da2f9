//! Listing, worker assignment and orchestration of the record pipeline.
//!
//! Data flows through the submodules in this order:
//!
//! 1. [`lister::ObjectLister`] pages through the bucket lazily
//! 2. [`task::TaskFilter`] keeps the non-empty objects owned by this worker
//! 3. [`template::FilenameTemplate`] derives the destination topic and partition
//! 4. [`iterator::SourceRecordIterator`] loads each object's offset, decodes it through
//!    a [`Transformer`](crate::transform::Transformer) and emits [`SourceRecord`]s

pub mod iterator;
pub mod lister;
pub mod task;
pub mod template;

pub use iterator::{SourceRecord, SourceRecordIterator};
pub use lister::{ObjectLister, ObjectSummaryIter};
pub use task::{TaskAssignment, TaskFilter, java_string_hash};
pub use template::{FilenameTemplate, TemplateMatch};
