use super::{DecodedRecord, RecordDecoder};
use crate::io::cloud::ObjectStream;
use crate::offset::OffsetEntry;
use anyhow::{Context, Result};
use arrow::json::ArrayWriter;
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};
use parquet::schema::printer::print_schema;
use serde_json::Value;
use std::collections::VecDeque;
use std::io::{Read, Write};
use std::path::PathBuf;
use tempfile::NamedTempFile;
use tracing::debug;

const BATCH_SIZE: usize = 1024;

/// Rows of a Parquet file, read from a local copy of the object.
#[derive(Debug, Clone)]
pub struct ParquetTransformer {
    temp_dir: Option<PathBuf>,
}

impl ParquetTransformer {
    pub(crate) fn new(temp_dir: Option<PathBuf>) -> Self {
        Self { temp_dir }
    }

    /// Copies `input` into a temp file named after the entry's topic and partition, then
    /// opens a batch reader over it. The temp file is removed if anything here fails.
    pub(crate) fn open(&self, mut input: ObjectStream, entry: &OffsetEntry) -> Result<ParquetDecoder> {
        let partition = entry
            .partition()
            .map_or_else(|| "null".to_string(), |p| p.to_string());
        let prefix = format!("{}_{}_", entry.topic(), partition);
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix).suffix(".parquet");
        let mut temp = match &self.temp_dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .with_context(|| format!("create temp file in {}", dir.display()))?,
            None => builder.tempfile().context("create temp file")?,
        };

        let copied = copy_to(&mut input, temp.as_file_mut())
            .with_context(|| format!("materialize object to {}", temp.path().display()))?;
        drop(input);
        debug!(path = %temp.path().display(), bytes = copied, "materialized parquet object");

        let file = temp
            .reopen()
            .with_context(|| format!("reopen {}", temp.path().display()))?;
        let builder =
            ParquetRecordBatchReaderBuilder::try_new(file).context("open ParquetRecordBatchReader")?;
        let mut schema = Vec::new();
        print_schema(&mut schema, builder.parquet_schema().root_schema());
        let reader = builder
            .with_batch_size(BATCH_SIZE)
            .build()
            .context("build ParquetRecordBatchReader")?;

        Ok(ParquetDecoder {
            reader: Some(reader),
            temp: Some(temp),
            schema: String::from_utf8_lossy(&schema).trim_end().to_string(),
            rows: VecDeque::new(),
        })
    }
}

fn copy_to(input: &mut impl Read, out: &mut impl Write) -> std::io::Result<u64> {
    let copied = std::io::copy(input, out)?;
    out.flush()?;
    Ok(copied)
}

/// Converts a batch into one JSON object per row. Null columns are omitted.
fn batch_rows(batch: &RecordBatch) -> Result<Vec<Value>> {
    let mut writer = ArrayWriter::new(Vec::new());
    writer.write(batch).context("convert RecordBatch to JSON")?;
    writer.finish().context("finish JSON conversion")?;
    serde_json::from_slice(&writer.into_inner()).context("parse converted rows")
}

pub(crate) struct ParquetDecoder {
    reader: Option<ParquetRecordBatchReader>,
    temp: Option<NamedTempFile>,
    schema: String,
    rows: VecDeque<Value>,
}

impl RecordDecoder for ParquetDecoder {
    fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        loop {
            if let Some(row) = self.rows.pop_front() {
                return Ok(Some(DecodedRecord::structured(row, Some(self.schema.clone()))));
            }
            let Some(reader) = self.reader.as_mut() else {
                return Ok(None);
            };
            match reader.next().transpose().context("read next batch")? {
                Some(batch) => self.rows.extend(batch_rows(&batch)?),
                None => return Ok(None),
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        self.reader = None;
        self.rows.clear();
        if let Some(temp) = self.temp.take() {
            let path = temp.path().to_path_buf();
            temp.close()
                .with_context(|| format!("delete temp file {}", path.display()))?;
            debug!(path = %path.display(), "deleted parquet temp file");
        }
        Ok(())
    }
}
