use std::sync::Arc;

use super::registry::StreamRegistry;
use super::types::{OpenOutcome, ReadBatch, StreamError, StreamId, StreamResult};
use crate::storage::SourceProvider;

/// Lines returned by a read that does not say how many it wants
pub const DEFAULT_READ_LINES: usize = 1;

/// The list / open / read / close operations exposed to the routing layer
pub struct StreamService {
    registry: StreamRegistry,
    provider: Arc<dyn SourceProvider>,
    max_read_lines: usize,
}

impl StreamService {
    pub fn new(
        registry: StreamRegistry,
        provider: Arc<dyn SourceProvider>,
        max_read_lines: usize,
    ) -> Self {
        Self {
            registry,
            provider,
            max_read_lines: max_read_lines.max(1),
        }
    }

    pub fn registry(&self) -> &StreamRegistry {
        &self.registry
    }

    pub fn list(&self) -> Vec<StreamId> {
        self.registry.list()
    }

    /// Open a stream over the item's source
    pub async fn open(&self, item_id: &str, want_header: bool) -> StreamResult<OpenOutcome> {
        // Cheap early out; the registry re-checks atomically on insert
        if self.registry.contains(item_id) {
            return Err(StreamError::AlreadyOpen(item_id.to_string()));
        }
        let source = self.provider.open_source(item_id).await?;
        self.registry
            .open(item_id.to_string(), source, want_header)
            .await
    }

    /// Read up to `lines` records (default 1)
    pub async fn read(&self, id: &str, lines: Option<usize>) -> StreamResult<ReadBatch> {
        let count = lines.unwrap_or(DEFAULT_READ_LINES);
        if count == 0 || count > self.max_read_lines {
            return Err(StreamError::InvalidCount {
                requested: count,
                max: self.max_read_lines,
            });
        }
        self.registry.read(id, count).await
    }

    pub async fn close(&self, id: &str) -> bool {
        self.registry.close(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{SourceError, SourceResult};
    use crate::stream::BoxedSource;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::io::Cursor;

    /// Serves fixed byte strings and counts opens
    #[derive(Default)]
    struct MemoryProvider {
        items: HashMap<String, Vec<u8>>,
        opens: Mutex<usize>,
    }

    impl MemoryProvider {
        fn with_item(mut self, id: &str, data: &str) -> Self {
            self.items.insert(id.to_string(), data.as_bytes().to_vec());
            self
        }
    }

    #[async_trait]
    impl SourceProvider for MemoryProvider {
        async fn open_source(&self, item_id: &str) -> SourceResult<BoxedSource> {
            *self.opens.lock() += 1;
            let data = self
                .items
                .get(item_id)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(item_id.to_string()))?;
            Ok(Box::new(Cursor::new(data)))
        }
    }

    fn service(provider: Arc<MemoryProvider>) -> StreamService {
        StreamService::new(StreamRegistry::new(), provider, 100)
    }

    #[tokio::test]
    async fn test_default_read_is_one_line() {
        let provider = Arc::new(MemoryProvider::default().with_item("item", "1\n2\n3\n"));
        let service = service(provider);

        service.open("item", false).await.unwrap();
        let batch = service.read("item", None).await.unwrap();
        assert_eq!(batch.data.len(), 1);
        assert!(batch.more);
    }

    #[tokio::test]
    async fn test_count_bounds() {
        let provider = Arc::new(MemoryProvider::default().with_item("item", "1\n"));
        let service = service(provider);
        service.open("item", false).await.unwrap();

        assert!(matches!(
            service.read("item", Some(0)).await,
            Err(StreamError::InvalidCount { requested: 0, .. })
        ));
        assert!(matches!(
            service.read("item", Some(101)).await,
            Err(StreamError::InvalidCount { max: 100, .. })
        ));
        // Rejected counts do not move the cursor
        assert_eq!(service.read("item", Some(1)).await.unwrap().data.len(), 1);
    }

    #[tokio::test]
    async fn test_already_open_skips_provider() {
        let provider = Arc::new(MemoryProvider::default().with_item("item", "a\n"));
        let service = service(Arc::clone(&provider));

        service.open("item", false).await.unwrap();
        assert!(matches!(
            service.open("item", true).await,
            Err(StreamError::AlreadyOpen(_))
        ));
        assert_eq!(*provider.opens.lock(), 1);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let service = service(Arc::new(MemoryProvider::default()));
        assert!(matches!(
            service.open("ghost", false).await,
            Err(StreamError::Source(SourceError::NotFound(_)))
        ));
        assert!(service.list().is_empty());
    }

    #[tokio::test]
    async fn test_read_unknown_stream() {
        let service = service(Arc::new(MemoryProvider::default()));
        assert!(matches!(
            service.read("ghost", None).await,
            Err(StreamError::NoSuchSession(_))
        ));
        assert!(!service.close("ghost").await);
    }
}
