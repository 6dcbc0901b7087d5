use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tracing::info;

use crate::config::publishers::PublisherConfig;
use crate::publishers::{DeliveryQueue, DistributionEndpoint};

/// Streams the bundle to a listener on a Unix domain socket, one connection
/// per bundle.
#[derive(Debug, Clone)]
pub struct UdsEndpoint {
    name: String,
    path: PathBuf,
    queue: DeliveryQueue,
}

impl UdsEndpoint {
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
        let mut stream = UnixStream::connect(&self.path)
            .await
            .with_context(|| format!("connect '{}'", self.path.display()))?;
        stream.write_all(bundle).await?;
        stream.shutdown().await?;
        info!("UDS publisher '{}' sent bundle to '{}'", self.name, self.path.display());
        Ok(())
    }
}

impl DistributionEndpoint for UdsEndpoint {
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
