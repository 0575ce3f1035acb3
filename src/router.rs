use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{close_stream, health_check, list_streams, open_stream, read_stream};
use crate::state::ServerState;

/// Stream requests carry everything in the path and query
const MAX_API_BODY_SIZE: usize = 64 * 1024;

pub fn create_router(state: Arc<ServerState>) -> Router {
    let cors_origins: Vec<HeaderValue> = state
        .config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(cors_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);

    Router::new()
        .route("/health", get(health_check))
        .route("/hpcmp/stream", get(list_streams))
        .route("/hpcmp/stream/{id}", post(open_stream).delete(close_stream))
        .route("/hpcmp/stream/{id}/read", post(read_stream))
        .layer(RequestBodyLimitLayer::new(MAX_API_BODY_SIZE))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
