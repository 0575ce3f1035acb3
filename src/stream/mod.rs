// Stream session engine
//
// A `LineReader` turns any byte source into newline-delimited lines, the
// decoder turns lines into CSV records, and the `StreamRegistry` keeps one
// session per open item. `StreamService` is the facade the HTTP layer calls.

mod decoder;
mod line_reader;
mod registry;
mod service;
mod session;
mod types;

pub use decoder::{decode_batch, decode_line};
pub use line_reader::{LineReader, DEFAULT_CHUNK_SIZE};
pub use registry::StreamRegistry;
pub use service::{StreamService, DEFAULT_READ_LINES};
pub use session::{BoxedSource, RawBatch, StreamSession};
pub use types::{OpenOutcome, ReadBatch, Record, StreamError, StreamId, StreamResult};
