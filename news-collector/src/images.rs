use crate::fetcher::FeedFetch;
use crate::storage::{ensure_dir, write_atomic};
use crate::types::{identity_hash, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Shared store of article images, named by the hash of their url.
#[derive(Debug, Clone)]
pub struct ImageCache {
    dir: PathBuf,
}

impl ImageCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: data_dir.into().join("_images"),
        }
    }

    pub fn path_for(&self, url: &str) -> PathBuf {
        self.dir.join(identity_hash(url))
    }

    /// Best effort: failures are logged and otherwise ignored.
    pub async fn store(&self, fetcher: &dyn FeedFetch, url: &str) -> Option<PathBuf> {
        let path = self.path_for(url);
        if path.exists() {
            debug!("Image already cached: {}", url);
            return Some(path);
        }

        match self.download(fetcher, url, &path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Failed to download image {}: {}", url, e);
                None
            }
        }
    }

    async fn download(&self, fetcher: &dyn FeedFetch, url: &str, path: &Path) -> Result<()> {
        let bytes = fetcher.fetch_bytes(url).await?;
        ensure_dir(&self.dir)?;
        write_atomic(path, &bytes)
    }
}
