//! Storage abstractions for the external collaborators of the record pipeline.
//!
//! This module provides **generic traits** for the stores the pipeline reads from,
//! in a provider-agnostic way:
//!
//! - [`ObjectIO`] - Object storage (S3, GCS, Azure Blob): paginated listing and body fetch
//! - [`OffsetStorageReader`] - Offsets persisted by the host runtime
//!
//! Each trait comes with an in-memory fake in [`fake`] for unit testing without
//! external dependencies.
//!
//! ## Synchronous Interface
//! The traits are blocking. The record pipeline is a single-threaded pull over one
//! logical sequence, so every store round-trip is a suspension point of the consumer's
//! `next()` call. Implementations can use `tokio` or similar internally, but expose a
//! blocking interface.
//!
//! ## Usage
//! ```
//! use ironbucket::io::cloud::*;
//!
//! # fn main() -> CloudResult<()> {
//! let storage = FakeObjectIO::new();
//! storage.put_object("bucket", "topic-00-1.txt", b"data".to_vec());
//!
//! let page = storage.list_objects(&ListObjectsRequest {
//!     bucket: "bucket".into(),
//!     max_keys: 10,
//!     ..Default::default()
//! })?;
//! assert_eq!(page.objects.len(), 1);
//! assert!(page.next_continuation_token.is_none());
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`CloudResult<T>`] where the error is [`CloudIOError`].
//! Errors are categorized by [`ErrorKind`]. No retry happens at this layer; retrying
//! transient failures is up to the store implementation or the host runtime.

pub mod fake;
pub mod traits;

pub use fake::*;
pub use traits::*;
