use std::sync::Arc;
use std::time::Instant;

use crate::config::ServerConfig;
use crate::storage::{FilesystemSourceProvider, SourceProvider};
use crate::stream::{StreamRegistry, StreamService};

/// Main server state shared across all handlers
pub struct ServerState {
    pub config: ServerConfig,
    pub streams: StreamService,
    pub start_time: Instant,
}

impl ServerState {
    /// State backed by the configured data directory
    pub fn new(config: ServerConfig) -> Self {
        let provider = Arc::new(FilesystemSourceProvider::new(config.data_directory.clone()));
        Self::with_provider(config, provider)
    }

    pub fn with_provider(config: ServerConfig, provider: Arc<dyn SourceProvider>) -> Self {
        let registry =
            StreamRegistry::with_capacity(config.max_sessions).with_chunk_size(config.read_chunk_size);
        let streams = StreamService::new(registry, provider, config.max_read_lines);

        Self {
            config,
            streams,
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
