//! Error types surfaced by the record pipeline.

use crate::io::cloud::CloudIOError;
use thiserror::Error;

/// Failure of a pull from the record pipeline.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Listing or fetch failure reported by the object store. Never retried internally.
    #[error("object store error: {0}")]
    Store(#[from] CloudIOError),

    /// Malformed bytes for the active input format.
    #[error("failed to decode object {key}: {source:#}")]
    Decode {
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// Persisted offset properties cannot be turned back into an entry.
    #[error("cannot reconstruct offset entry: {reason}")]
    OffsetReconstruction { reason: String },

    /// Attempt to overwrite a property owned by the offset entry itself.
    #[error("'{0}' is a restricted key and may not be set using set_property()")]
    RestrictedProperty(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SourceError {
    pub(crate) fn decode(key: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Decode {
            key: key.into(),
            source,
        }
    }

    pub(crate) fn reconstruction(reason: impl Into<String>) -> Self {
        Self::OffsetReconstruction {
            reason: reason.into(),
        }
    }
}

pub type SourceResult<T> = Result<T, SourceError>;
