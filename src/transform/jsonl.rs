use super::{DecodedRecord, RecordDecoder};
use crate::io::cloud::ObjectStream;
use anyhow::{Context, Result, bail};
use serde_json::Value;
use std::io::{BufRead, BufReader};

/// One JSON document per non-blank line.
#[derive(Debug, Clone)]
pub struct JsonlTransformer {
    schemas_enable: bool,
}

impl JsonlTransformer {
    pub(crate) fn new(schemas_enable: bool) -> Self {
        Self { schemas_enable }
    }

    pub(crate) fn open(&self, input: ObjectStream) -> JsonlDecoder {
        JsonlDecoder {
            reader: BufReader::new(input),
            schemas_enable: self.schemas_enable,
            line_no: 0,
            line: String::new(),
        }
    }
}

pub(crate) struct JsonlDecoder {
    reader: BufReader<ObjectStream>,
    schemas_enable: bool,
    line_no: usize,
    line: String,
}

impl JsonlDecoder {
    fn convert(&self, value: Value) -> Result<DecodedRecord> {
        if !self.schemas_enable {
            return Ok(DecodedRecord::structured(value, None));
        }
        let Value::Object(mut envelope) = value else {
            bail!("line {}: expected a schema/payload envelope", self.line_no);
        };
        let (Some(schema), Some(payload)) = (envelope.remove("schema"), envelope.remove("payload"))
        else {
            bail!(
                "line {}: envelope must contain 'schema' and 'payload' fields",
                self.line_no
            );
        };
        let schema = match schema {
            Value::Null => None,
            other => Some(serde_json::to_string(&other)?),
        };
        Ok(DecodedRecord::structured(payload, schema))
    }
}

impl RecordDecoder for JsonlDecoder {
    fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .with_context(|| format!("read line {}", self.line_no + 1))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let line = self.line.trim();
            if line.is_empty() {
                continue;
            }
            let value: Value = serde_json::from_str(line)
                .with_context(|| format!("parse JSONL line {}: {}", self.line_no, line))?;
            return self.convert(value).map(Some);
        }
    }
}
