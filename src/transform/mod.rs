//! Format decoders that turn an object's bytes into a lazy sequence of records.
//!
//! A [`Transformer`] is chosen once from [`InputFormat`] and reused for every object.
//! [`Transformer::get_records`] returns a [`RecordStream`] that opens the object on the
//! first pull, skips the records an earlier run already delivered, and releases the
//! object on exhaustion, failure, [`RecordStream::close`], or drop.
//!
//! | Format    | Record boundary               | Feature      |
//! |-----------|-------------------------------|--------------|
//! | `bytes`   | fixed-size chunks             | always       |
//! | `jsonl`   | one non-blank line            | `io-jsonl`   |
//! | `avro`    | object container blocks       | `io-avro`    |
//! | `parquet` | one row (via a temp file)     | `io-parquet` |

mod bytes;
#[cfg(feature = "io-avro")]
mod avro;
#[cfg(feature = "io-jsonl")]
mod jsonl;
#[cfg(feature = "io-parquet")]
mod parquet;
mod stream;

pub use stream::RecordStream;

use crate::error::SourceError;
use crate::io::cloud::{CloudResult, ObjectStream};
use crate::offset::OffsetEntry;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Chunk size of the raw-bytes format.
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 4096;

/// Input formats the pipeline can decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputFormat {
    #[default]
    Bytes,
    Jsonl,
    Avro,
    Parquet,
}

impl InputFormat {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bytes => "bytes",
            Self::Jsonl => "jsonl",
            Self::Avro => "avro",
            Self::Parquet => "parquet",
        }
    }
}

impl fmt::Display for InputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputFormat {
    type Err = SourceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bytes" => Ok(Self::Bytes),
            "jsonl" => Ok(Self::Jsonl),
            "avro" => Ok(Self::Avro),
            "parquet" => Ok(Self::Parquet),
            other => Err(SourceError::Config(format!("unknown input format '{other}'"))),
        }
    }
}

/// Per-format decoder settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransformerConfig {
    /// Chunk size of the raw-bytes format.
    pub max_buffer_size: usize,
    /// Expect `{"schema": .., "payload": ..}` envelopes on every JSON line.
    pub schemas_enable: bool,
    /// Where the columnar format materializes objects. System temp dir when unset.
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
            schemas_enable: false,
            temp_dir: None,
        }
    }
}

/// Payload of one decoded record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Bytes(Vec<u8>),
    Structured(serde_json::Value),
}

/// One record produced by a decoder.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    /// Type tag describing `value`, when the format carries one.
    pub schema: Option<String>,
    pub value: RecordValue,
}

impl DecodedRecord {
    #[must_use]
    pub fn bytes(data: Vec<u8>) -> Self {
        Self {
            schema: None,
            value: RecordValue::Bytes(data),
        }
    }

    #[must_use]
    pub fn structured(value: serde_json::Value, schema: Option<String>) -> Self {
        Self {
            schema,
            value: RecordValue::Structured(value),
        }
    }
}

/// An opened object being decoded record by record.
pub(crate) trait RecordDecoder {
    /// The next record, or `None` once the object is exhausted.
    fn next_record(&mut self) -> Result<Option<DecodedRecord>>;

    /// Releases format-specific resources. The object stream itself is dropped by the
    /// caller regardless of the outcome.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Deferred fetch of an object's bytes.
pub type StreamSupplier = Box<dyn FnOnce() -> CloudResult<ObjectStream> + Send>;

/// Format decoder selected from configuration.
#[derive(Debug, Clone)]
pub enum Transformer {
    Bytes(bytes::ByteChunkTransformer),
    #[cfg(feature = "io-jsonl")]
    Jsonl(jsonl::JsonlTransformer),
    #[cfg(feature = "io-avro")]
    Avro(avro::AvroTransformer),
    #[cfg(feature = "io-parquet")]
    Parquet(parquet::ParquetTransformer),
}

impl Transformer {
    /// Selects the decoder for `format`.
    ///
    /// # Errors
    /// Returns [`SourceError::Config`] if the format's feature is disabled, or if the
    /// raw-bytes chunk size is zero.
    pub fn from_config(format: InputFormat, config: &TransformerConfig) -> Result<Self, SourceError> {
        match format {
            InputFormat::Bytes => {
                if config.max_buffer_size == 0 {
                    return Err(SourceError::Config(
                        "max buffer size must be positive".to_string(),
                    ));
                }
                Ok(Self::Bytes(bytes::ByteChunkTransformer::new(
                    config.max_buffer_size,
                )))
            }
            #[cfg(feature = "io-jsonl")]
            InputFormat::Jsonl => Ok(Self::Jsonl(jsonl::JsonlTransformer::new(
                config.schemas_enable,
            ))),
            #[cfg(feature = "io-avro")]
            InputFormat::Avro => Ok(Self::Avro(avro::AvroTransformer)),
            #[cfg(feature = "io-parquet")]
            InputFormat::Parquet => Ok(Self::Parquet(parquet::ParquetTransformer::new(
                config.temp_dir.clone(),
            ))),
            #[allow(unreachable_patterns)]
            other => Err(SourceError::Config(format!(
                "input format '{other}' is not enabled in this build"
            ))),
        }
    }

    #[must_use]
    pub fn format(&self) -> InputFormat {
        match self {
            Self::Bytes(_) => InputFormat::Bytes,
            #[cfg(feature = "io-jsonl")]
            Self::Jsonl(_) => InputFormat::Jsonl,
            #[cfg(feature = "io-avro")]
            Self::Avro(_) => InputFormat::Avro,
            #[cfg(feature = "io-parquet")]
            Self::Parquet(_) => InputFormat::Parquet,
        }
    }

    /// Lazily decodes one object.
    ///
    /// Nothing is fetched until the returned stream is first advanced, so a failing
    /// `supplier` surfaces as the stream's first item. The stream skips the first
    /// `entry.skip_records()` records and owns `entry` for its lifetime.
    #[must_use]
    pub fn get_records(&self, supplier: StreamSupplier, entry: OffsetEntry) -> RecordStream {
        RecordStream::new(self.clone(), supplier, entry)
    }

    /// Key payload for records of `object_key`.
    #[must_use]
    pub fn key_data(&self, object_key: &str) -> Vec<u8> {
        object_key.as_bytes().to_vec()
    }

    fn open(&self, input: ObjectStream, entry: &OffsetEntry) -> Result<Box<dyn RecordDecoder>> {
        let decoder: Result<Box<dyn RecordDecoder>> = match self {
            Self::Bytes(t) => Ok(Box::new(t.open(input))),
            #[cfg(feature = "io-jsonl")]
            Self::Jsonl(t) => Ok(Box::new(t.open(input))),
            #[cfg(feature = "io-avro")]
            Self::Avro(t) => Ok(Box::new(t.open(input)?)),
            #[cfg(feature = "io-parquet")]
            Self::Parquet(t) => Ok(Box::new(t.open(input, entry)?)),
        };
        decoder.with_context(|| format!("open {}", entry.object_key()))
    }
}
