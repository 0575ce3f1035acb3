use chrono::{DateTime, Utc};
use std::io::Read;
use tracing::debug;

use super::decoder::{decode_batch, decode_line};
use super::line_reader::LineReader;
use super::types::{Record, StreamError, StreamId, StreamResult};

/// Byte source owned by a session
pub type BoxedSource = Box<dyn Read + Send>;

/// One open cursor over one byte source
pub struct StreamSession {
    id: StreamId,
    reader: LineReader<BoxedSource>,
    header: Option<Vec<String>>,
    opened_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    lines_read: u64,
}

/// Raw lines pulled by one read, before decoding
#[derive(Debug, Default)]
pub struct RawBatch {
    pub lines: Vec<Vec<u8>>,
    /// True when the source ran dry before the requested count was reached
    pub exhausted: bool,
}

impl StreamSession {
    pub fn new(id: StreamId, source: BoxedSource, chunk_size: usize) -> Self {
        let now = Utc::now();
        Self {
            id,
            reader: LineReader::with_chunk_size(source, chunk_size),
            header: None,
            opened_at: now,
            last_access: now,
            lines_read: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn header(&self) -> Option<&[String]> {
        self.header.as_deref()
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    pub fn lines_read(&self) -> u64 {
        self.lines_read
    }

    /// Consume the first line as the header. Can only happen once.
    ///
    /// An empty source produces an empty header.
    pub fn capture_header(&mut self) -> StreamResult<Vec<String>> {
        if let Some(header) = &self.header {
            return Ok(header.clone());
        }

        let fields = match self.next_line()? {
            Some(line) => decode_line(&line).map_err(|e| StreamError::Decode {
                line: 1,
                message: e.to_string(),
            })?,
            None => Vec::new(),
        };

        debug!("Stream {} header: {:?}", self.id, fields);
        self.header = Some(fields.clone());
        Ok(fields)
    }

    /// Pull up to `count` raw lines, stopping early at end of source
    pub fn pull(&mut self, count: usize) -> StreamResult<RawBatch> {
        self.last_access = Utc::now();

        let mut batch = RawBatch::default();
        for _ in 0..count {
            match self.next_line()? {
                Some(line) => batch.lines.push(line),
                None => {
                    batch.exhausted = true;
                    break;
                }
            }
        }
        Ok(batch)
    }

    /// Decode raw lines with this session's header
    pub fn decode(&self, lines: &[Vec<u8>]) -> StreamResult<Vec<Record>> {
        decode_batch(lines, self.header())
    }

    fn next_line(&mut self) -> StreamResult<Option<Vec<u8>>> {
        let line = self.reader.next_line().map_err(|source| StreamError::Io {
            id: self.id.clone(),
            source,
        })?;
        if line.is_some() {
            self.lines_read += 1;
        }
        Ok(line)
    }
}

impl std::fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("header", &self.header)
            .field("lines_read", &self.lines_read)
            .field("buffered", &self.reader.buffered())
            .finish()
    }
}
