use super::{DecodedRecord, RecordDecoder};
use crate::io::cloud::ObjectStream;
use anyhow::{Context, Result};
use apache_avro::Reader;

/// Records of an Avro object container file.
#[derive(Debug, Clone, Copy)]
pub struct AvroTransformer;

impl AvroTransformer {
    /// Reads the container header. Fails if the object is not an Avro container.
    pub(crate) fn open(self, input: ObjectStream) -> Result<AvroDecoder> {
        let reader = Reader::new(input).context("read Avro container header")?;
        let schema = reader.writer_schema().canonical_form();
        Ok(AvroDecoder {
            reader,
            schema,
            index: 0,
        })
    }
}

pub(crate) struct AvroDecoder {
    reader: Reader<'static, ObjectStream>,
    schema: String,
    index: usize,
}

impl RecordDecoder for AvroDecoder {
    fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        let Some(value) = self.reader.next() else {
            return Ok(None);
        };
        self.index += 1;
        let value = value.with_context(|| format!("read Avro record {}", self.index))?;
        let json = serde_json::Value::try_from(value)
            .with_context(|| format!("convert Avro record {}", self.index))?;
        Ok(Some(DecodedRecord::structured(json, Some(self.schema.clone()))))
    }
}
