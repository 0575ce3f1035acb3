use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use super::traits::{SourceError, SourceProvider, SourceResult};
use crate::stream::BoxedSource;

/// Serves items out of a directory tree.
///
/// An item id is a path relative to the root. A file is streamed directly;
/// a directory is treated as an item holding files and its first regular
/// file (by name) is streamed.
#[derive(Debug, Clone)]
pub struct FilesystemSourceProvider {
    root: PathBuf,
}

impl FilesystemSourceProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map an item id to a canonical path inside the root
    async fn resolve(&self, item_id: &str) -> SourceResult<PathBuf> {
        // SECURITY: Reject absolute paths and traversal before touching the disk
        let requested = PathBuf::from(item_id);
        if item_id.is_empty() || requested.is_absolute() {
            warn!("Rejected item id: {:?}", item_id);
            return Err(SourceError::AccessDenied(item_id.to_string()));
        }
        if requested
            .components()
            .any(|c| matches!(c, Component::ParentDir))
        {
            warn!("Rejected path traversal attempt: {}", item_id);
            return Err(SourceError::AccessDenied(item_id.to_string()));
        }

        let canonical_base = tokio::fs::canonicalize(&self.root).await.map_err(|e| {
            SourceError::NotConfigured(format!("{}: {}", self.root.display(), e))
        })?;
        let canonical = tokio::fs::canonicalize(self.root.join(&requested))
            .await
            .map_err(|_| SourceError::NotFound(item_id.to_string()))?;

        // Symlinks may still point outside the root
        if !canonical.starts_with(&canonical_base) {
            warn!(
                "Item {} resolves outside of {}",
                item_id,
                canonical_base.display()
            );
            return Err(SourceError::AccessDenied(item_id.to_string()));
        }

        let metadata = tokio::fs::metadata(&canonical).await?;
        if metadata.is_file() {
            return Ok(canonical);
        }

        first_file(&canonical)
            .await?
            .ok_or_else(|| SourceError::Empty(item_id.to_string()))
    }
}

/// First regular file in `dir`, by file name
async fn first_file(dir: &Path) -> SourceResult<Option<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files.into_iter().next())
}

#[async_trait]
impl SourceProvider for FilesystemSourceProvider {
    async fn open_source(&self, item_id: &str) -> SourceResult<BoxedSource> {
        let path = self.resolve(item_id).await?;
        debug!("Opening {} for item {}", path.display(), item_id);
        let file = tokio::fs::File::open(&path).await?.into_std().await;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    async fn read_all(provider: &FilesystemSourceProvider, id: &str) -> String {
        let mut source = provider.open_source(id).await.unwrap();
        let mut text = String::new();
        source.read_to_string(&mut text).unwrap();
        text
    }

    #[tokio::test]
    async fn test_opens_file_by_relative_path() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.csv"), "a,b\n1,2\n").unwrap();

        let provider = FilesystemSourceProvider::new(dir.path());
        assert_eq!(read_all(&provider, "data.csv").await, "a,b\n1,2\n");
    }

    #[tokio::test]
    async fn test_directory_item_streams_first_file() {
        let dir = TempDir::new().unwrap();
        let item = dir.path().join("item42");
        std::fs::create_dir(&item).unwrap();
        std::fs::write(item.join("b.csv"), "second").unwrap();
        std::fs::write(item.join("a.csv"), "first").unwrap();
        std::fs::create_dir(item.join("0-subdir")).unwrap();

        let provider = FilesystemSourceProvider::new(dir.path());
        assert_eq!(read_all(&provider, "item42").await, "first");
    }

    #[tokio::test]
    async fn test_empty_directory_item() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("hollow")).unwrap();

        let provider = FilesystemSourceProvider::new(dir.path());
        assert!(matches!(
            provider.open_source("hollow").await,
            Err(SourceError::Empty(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_escapes() {
        let dir = TempDir::new().unwrap();
        let provider = FilesystemSourceProvider::new(dir.path());

        for id in ["../etc/passwd", "/etc/passwd", ""] {
            assert!(
                matches!(
                    provider.open_source(id).await,
                    Err(SourceError::AccessDenied(_))
                ),
                "{} should be rejected",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_dots_inside_a_name_are_allowed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("v1..2.csv"), "x\n").unwrap();

        let provider = FilesystemSourceProvider::new(dir.path());
        assert_eq!(read_all(&provider, "v1..2.csv").await, "x\n");
        assert!(matches!(
            provider.open_source("sub/../../v1..2.csv").await,
            Err(SourceError::AccessDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_item() {
        let dir = TempDir::new().unwrap();
        let provider = FilesystemSourceProvider::new(dir.path());
        assert!(matches!(
            provider.open_source("nope.csv").await,
            Err(SourceError::NotFound(_))
        ));
    }
}
