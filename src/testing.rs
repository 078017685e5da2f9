//! Payload fixtures for exercising the record pipeline.
//!
//! Every helper returns the raw bytes of an object, ready to be stored with
//! [`FakeObjectIO::put_object`](crate::io::cloud::FakeObjectIO::put_object):
//!
//! - [`jsonl_lines`]: `n` numbered JSON documents, one per line
//! - [`avro_container`]: an Avro object container file (feature `io-avro`)
//! - [`parquet_bytes`]: a single-row-group Parquet file (feature `io-parquet`)
//!
//! ```
//! use ironbucket::io::cloud::FakeObjectIO;
//! use ironbucket::testing::jsonl_lines;
//!
//! let store = FakeObjectIO::new();
//! store.put_object("bucket", "topic-00-0.txt", jsonl_lines(3));
//! ```

#[cfg(any(feature = "io-avro", feature = "io-parquet"))]
use anyhow::{Context, Result};
#[cfg(any(feature = "io-avro", feature = "io-parquet"))]
use serde::Serialize;

/// `n` lines of the form `{"id":<i>,"message":"record <i>"}`, starting at 0.
#[must_use]
pub fn jsonl_lines(n: usize) -> Vec<u8> {
    (0..n)
        .map(|i| format!("{{\"id\":{i},\"message\":\"record {i}\"}}\n"))
        .collect::<String>()
        .into_bytes()
}

/// Serializes `rows` into an Avro container with the writer schema `schema_json`.
///
/// # Errors
/// Returns an error if the schema does not parse or a row does not match it.
#[cfg(feature = "io-avro")]
pub fn avro_container<T: Serialize>(schema_json: &str, rows: &[T]) -> Result<Vec<u8>> {
    use apache_avro::{Schema, Writer};

    let schema = Schema::parse_str(schema_json).context("parse Avro schema")?;
    let mut writer = Writer::new(&schema, Vec::new());
    for row in rows {
        writer.append_ser(row).context("append Avro record")?;
    }
    writer.into_inner().context("finish Avro container")
}

/// Writes `rows` as a Parquet file held in memory.
///
/// The Arrow schema is inferred from `T` the same way for empty and non-empty input.
///
/// # Errors
/// Returns an error if schema inference, batch conversion, or writing fails.
#[cfg(feature = "io-parquet")]
pub fn parquet_bytes<T: Serialize + serde::Deserialize<'static>>(rows: &[T]) -> Result<Vec<u8>> {
    use arrow::datatypes::FieldRef;
    use parquet::arrow::arrow_writer::ArrowWriter;
    use serde_arrow::schema::{SchemaLike, TracingOptions};

    let fields = Vec::<FieldRef>::from_type::<T>(TracingOptions::default())
        .context("infer Arrow schema from type T")?;
    let batch =
        serde_arrow::to_record_batch(&fields, &rows).context("convert rows to RecordBatch")?;

    let mut buf = Vec::new();
    let mut writer =
        ArrowWriter::try_new(&mut buf, batch.schema(), None).context("create ArrowWriter")?;
    writer.write(&batch).context("write batch to parquet")?;
    writer.close().context("close ArrowWriter")?;
    Ok(buf)
}
