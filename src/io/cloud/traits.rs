//! Core traits for the external storage collaborators.
//!
//! These traits provide synchronous interfaces for the two stores the record pipeline
//! talks to: the object store that holds the input blobs, and the offset store that
//! holds progress persisted by the host runtime.

use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Read;
use thiserror::Error;

// ============================================================================
// Core Error Type
// ============================================================================

/// Generic error type for store operations
#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct CloudIOError {
    pub message: String,
    pub kind: ErrorKind,
    pub cause: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Authentication,
    Authorization,
    NotFound,
    InvalidInput,
    Network,
    Timeout,
    ServiceUnavailable,
    RateLimited,
    InternalError,
    Other,
}

impl CloudIOError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            cause: None,
        }
    }

    #[must_use]
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Whether the same request may succeed if repeated.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Network
                | ErrorKind::Timeout
                | ErrorKind::ServiceUnavailable
                | ErrorKind::RateLimited
        )
    }
}

pub type CloudResult<T> = Result<T, CloudIOError>;

// ============================================================================
// ObjectIO - Object Storage
// ============================================================================

/// Key and size of one object, as reported by a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
}

impl ObjectSummary {
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size,
        }
    }
}

/// One listing round-trip.
///
/// `continuation_token` and `start_after` are mutually exclusive: the first page of a
/// listing may carry `start_after`, every following page carries only the token.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListObjectsRequest {
    pub bucket: String,
    pub prefix: Option<String>,
    pub max_keys: u32,
    pub continuation_token: Option<String>,
    pub start_after: Option<String>,
}

/// One page of listing results, ordered lexicographically by key.
#[derive(Debug, Clone, Default)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectSummary>,
    /// Present while the store has more pages to return.
    pub next_continuation_token: Option<String>,
}

/// A readable object body. Dropping it releases the underlying connection.
pub type ObjectStream = Box<dyn Read + Send>;

/// Trait for object storage operations
pub trait ObjectIO: Send + Sync {
    /// Fetch one page of object summaries
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket doesn't exist, permissions are not enough, or the listing fails
    fn list_objects(&self, request: &ListObjectsRequest) -> CloudResult<ListObjectsPage>;

    /// Open the body of an object for reading
    ///
    /// # Errors
    ///
    /// Returns an error if the object doesn't exist, permissions are not enough, or the download fails
    fn get_object(&self, bucket: &str, key: &str) -> CloudResult<ObjectStream>;
}

// ============================================================================
// OffsetStorageReader - Persisted Progress
// ============================================================================

/// Canonical map form of offset identities and offset properties.
pub type PropertyMap = BTreeMap<String, Value>;

/// Read access to the offsets the host runtime has persisted.
pub trait OffsetStorageReader: Send + Sync {
    /// Look up the properties stored under a partition identity map
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be reached
    fn offset(&self, partition: &PropertyMap) -> CloudResult<Option<PropertyMap>>;
}
