use super::{DecodedRecord, RecordDecoder};
use crate::io::cloud::ObjectStream;
use anyhow::{Context, Result};
use std::io::{ErrorKind, Read};

/// Splits an object into chunks of at most `max_buffer_size` bytes.
#[derive(Debug, Clone)]
pub struct ByteChunkTransformer {
    max_buffer_size: usize,
}

impl ByteChunkTransformer {
    pub(crate) fn new(max_buffer_size: usize) -> Self {
        Self { max_buffer_size }
    }

    pub(crate) fn open(&self, input: ObjectStream) -> ByteChunkDecoder {
        ByteChunkDecoder {
            input,
            max_buffer_size: self.max_buffer_size,
        }
    }
}

pub(crate) struct ByteChunkDecoder {
    input: ObjectStream,
    max_buffer_size: usize,
}

/// Reads until `buf` is full or the input ends. Returns the number of bytes read.
fn read_full(input: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl RecordDecoder for ByteChunkDecoder {
    fn next_record(&mut self) -> Result<Option<DecodedRecord>> {
        let mut buffer = vec![0u8; self.max_buffer_size];
        let read = read_full(&mut self.input, &mut buffer).context("read object bytes")?;
        if read == 0 {
            return Ok(None);
        }
        buffer.truncate(read);
        Ok(Some(DecodedRecord::bytes(buffer)))
    }
}
