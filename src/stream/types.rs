// Common types for the stream session engine

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::storage::SourceError;

/// Identifier of an open stream, derived from the item it reads
pub type StreamId = String;

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while operating on stream sessions
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Stream already open: {0}")]
    AlreadyOpen(StreamId),

    #[error("No such stream {0}")]
    NoSuchSession(StreamId),

    #[error("Too many open streams (limit {0})")]
    AtCapacity(usize),

    #[error("Invalid line count {requested}: must be between 1 and {max}")]
    InvalidCount { requested: usize, max: usize },

    #[error("IO error on stream {id}: {source}")]
    Io {
        id: StreamId,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV at line {line} of batch: {message}")]
    Decode { line: usize, message: String },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Background task failed: {0}")]
    Task(String),
}

/// One decoded CSV row
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// Plain ordered field list (no header declared)
    Fields(Vec<String>),
    /// Header name to value pairs, in header order
    Named(Vec<(String, String)>),
}

impl Record {
    /// Look up a named field; always `None` for plain rows
    pub fn get(&self, name: &str) -> Option<&str> {
        match self {
            Record::Fields(_) => None,
            Record::Named(pairs) => pairs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Record::Fields(fields) => fields.len(),
            Record::Named(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Record::Fields(fields) => fields.serialize(serializer),
            Record::Named(pairs) => {
                let mut map = serializer.serialize_map(Some(pairs.len()))?;
                for (key, value) in pairs {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
        }
    }
}

/// Outcome of opening a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OpenOutcome {
    /// Header fields captured from the first line
    Header(Vec<String>),
    /// No header requested; the stream id is echoed back
    Id(StreamId),
}

/// One bounded read from a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadBatch {
    pub data: Vec<Record>,
    /// `false` once the source is exhausted and the stream has been removed
    pub more: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_named_record_keeps_header_order() {
        let record = Record::Named(vec![
            ("zeta".to_string(), "1".to_string()),
            ("alpha".to_string(), "2".to_string()),
        ]);

        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"zeta":"1","alpha":"2"}"#);
        assert_eq!(record.get("alpha"), Some("2"));
        assert_eq!(record.get("missing"), None);
    }

    #[test]
    fn test_open_outcome_is_untagged() {
        let header = OpenOutcome::Header(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(serde_json::to_value(&header).unwrap(), serde_json::json!(["a", "b"]));

        let id = OpenOutcome::Id("item-1".to_string());
        assert_eq!(serde_json::to_value(&id).unwrap(), serde_json::json!("item-1"));
    }

    #[test]
    fn test_read_batch_shape() {
        let batch = ReadBatch {
            data: vec![Record::Fields(vec!["1".to_string(), "2".to_string()])],
            more: true,
        };
        assert_eq!(
            serde_json::to_value(&batch).unwrap(),
            serde_json::json!({"data": [["1", "2"]], "more": true})
        );
    }
}
