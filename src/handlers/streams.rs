use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, warn};

use crate::state::ServerState;
use crate::storage::SourceError;
use crate::stream::{ReadBatch, StreamError, StreamId};

/// Query params for opening a stream
#[derive(Debug, Deserialize)]
pub struct OpenStreamQuery {
    /// Treat the first line as the CSV header
    pub header: Option<bool>,
}

/// Query params for reading from a stream
#[derive(Debug, Deserialize)]
pub struct ReadStreamQuery {
    /// How many lines to read (default 1)
    pub lines: Option<usize>,
}

/// Map a stream failure to a status code and message
pub fn stream_error_response(err: StreamError) -> (StatusCode, String) {
    let status = match &err {
        StreamError::AlreadyOpen(_) => StatusCode::CONFLICT,
        StreamError::NoSuchSession(_) => StatusCode::NOT_FOUND,
        StreamError::AtCapacity(_) => StatusCode::SERVICE_UNAVAILABLE,
        StreamError::InvalidCount { .. } => StatusCode::BAD_REQUEST,
        StreamError::Decode { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        StreamError::Source(SourceError::NotFound(_)) | StreamError::Source(SourceError::Empty(_)) => {
            StatusCode::NOT_FOUND
        }
        StreamError::Source(SourceError::AccessDenied(_)) => StatusCode::FORBIDDEN,
        StreamError::Source(_) | StreamError::Io { .. } | StreamError::Task(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status.is_server_error() {
        error!("Stream operation failed: {}", err);
    } else {
        warn!("Stream request rejected: {}", err);
    }

    (status, err.to_string())
}

/// List all open streams
pub async fn list_streams(State(state): State<Arc<ServerState>>) -> Json<Vec<StreamId>> {
    Json(state.streams.list())
}

/// Open a new stream for reading.
///
/// Answers with the header fields, or the id when no header was requested.
/// A stream that is already open answers `false`.
pub async fn open_stream(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<OpenStreamQuery>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    match state.streams.open(&id, query.header.unwrap_or(false)).await {
        Ok(outcome) => Ok(Json(serde_json::to_value(outcome).map_err(|e| {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?)),
        Err(StreamError::AlreadyOpen(_)) => Ok(Json(serde_json::Value::Bool(false))),
        Err(e) => Err(stream_error_response(e)),
    }
}

/// Read lines from a stream
pub async fn read_stream(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
    Query(query): Query<ReadStreamQuery>,
) -> Result<Json<ReadBatch>, (StatusCode, String)> {
    state
        .streams
        .read(&id, query.lines)
        .await
        .map(Json)
        .map_err(stream_error_response)
}

/// Close a stream; answers whether it was open
pub async fn close_stream(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Json<bool> {
    Json(state.streams.close(&id).await)
}
