use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::info;

use crate::config::publishers::PublisherConfig;
use crate::publishers::{DeliveryQueue, DistributionEndpoint};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Writes the bundle to a file shared with workers, atomically: readers see
/// either the previous bundle or the new one, never a partial write.
#[derive(Debug, Clone)]
pub struct FileEndpoint {
    name: String,
    path: PathBuf,
    queue: DeliveryQueue,
}

impl FileEndpoint {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            queue: DeliveryQueue::default(),
        }
    }

    pub fn from_config(cfg: &PublisherConfig) -> Result<Self> {
        let path = cfg
            .path
            .as_ref()
            .ok_or_else(|| anyhow!("publisher '{}' requires a path", cfg.publisher_id))?;
        Ok(Self::new(cfg.publisher_id.as_str(), path))
    }

    pub async fn deliver(&self, bundle: &[u8]) -> Result<()> {
        write_atomic(&self.path, bundle).await?;
        info!("bundle written to '{}'", self.path.display());
        Ok(())
    }
}

impl DistributionEndpoint for FileEndpoint {
    fn name(&self) -> &str {
        &self.name
    }

    fn publish(&self, bundle: Arc<Vec<u8>>) {
        let endpoint = self.clone();
        self.queue.push(&self.name, bundle, move |bundle| {
            let endpoint = endpoint.clone();
            async move { endpoint.deliver(&bundle).await }
        });
    }
}

/// Sibling temp file, unique per process and write.
fn tmp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_owned());
    let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
    path.with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), seq))
}

async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let tmp = tmp_path(path);
    if let Err(err) = tokio::fs::write(&tmp, content).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("write '{}'", tmp.display()));
    }
    if let Err(err) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err).with_context(|| format!("rename '{}' to '{}'", tmp.display(), path.display()));
    }
    Ok(())
}
