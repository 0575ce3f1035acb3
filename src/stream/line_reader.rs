// Newline-delimited reader over an arbitrary byte source
//
// Pulls fixed-size chunks from the source and hands out one line at a time.
// The newline byte itself is consumed; a trailing unterminated chunk is
// returned as the final line. Once the source reports end-of-data with an
// empty buffer the reader is exhausted for good.

use std::io::{self, ErrorKind, Read};

/// Chunk size used when none is configured
pub const DEFAULT_CHUNK_SIZE: usize = 100;

pub struct LineReader<R> {
    source: R,
    buffer: Vec<u8>,
    chunk: Vec<u8>,
    /// Bytes of `buffer` already scanned for a newline
    scanned: usize,
    exhausted: bool,
}

impl<R: Read> LineReader<R> {
    pub fn new(source: R) -> Self {
        Self::with_chunk_size(source, DEFAULT_CHUNK_SIZE)
    }

    /// A zero chunk size is bumped to one byte.
    pub fn with_chunk_size(source: R, chunk_size: usize) -> Self {
        Self {
            source,
            buffer: Vec::new(),
            chunk: vec![0; chunk_size.max(1)],
            scanned: 0,
            exhausted: false,
        }
    }

    /// Next line without its newline, or `None` once the source is drained.
    pub fn next_line(&mut self) -> io::Result<Option<Vec<u8>>> {
        loop {
            if let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') {
                let newline = self.scanned + offset;
                let rest = self.buffer.split_off(newline + 1);
                let mut line = std::mem::replace(&mut self.buffer, rest);
                line.truncate(newline);
                self.scanned = 0;
                return Ok(Some(line));
            }
            self.scanned = self.buffer.len();

            if self.exhausted {
                return Ok(None);
            }

            let read = match self.source.read(&mut self.chunk) {
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };

            if read == 0 {
                self.exhausted = true;
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                self.scanned = 0;
                return Ok(Some(std::mem::take(&mut self.buffer)));
            }

            self.buffer.extend_from_slice(&self.chunk[..read]);
        }
    }

    /// True once end-of-data was seen and no buffered bytes remain
    pub fn is_exhausted(&self) -> bool {
        self.exhausted && self.buffer.is_empty()
    }

    /// Bytes read from the source but not yet returned as a line
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}

impl<R: Read> Iterator for LineReader<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_line().transpose()
    }
}
