use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use http::header::CONTENT_TYPE;
use reqwest::Client;
use tracing::info;

use crate::config::publishers::PublisherConfig;
use crate::publishers::{DeliveryQueue, DistributionEndpoint};
use crate::utils::constants::DEFAULT_HTTP_TIMEOUT_MS;

/// POSTs the bundle to a collector that fans it out to workers.
#[derive(Debug, Clone)]
pub struct HttpEndpoint {
    name: String,
    url: String,
    timeout: Duration,
    client: Client,
    queue: DeliveryQueue,
}

impl HttpEndpoint {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration, client: Client) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            timeout,
            client,
            queue: DeliveryQueue::default(),
        }
    }

    pub fn from_config(cfg: &PublisherConfig, client: Client) -> Result<Self> {
        let url = cfg
            .url
            .as_ref()
            .ok_or_else(|| anyhow!("publisher '{}' requires a url", cfg.publisher_id))?;
        let timeout = Duration::from_millis(cfg.timeout_ms.unwrap_or(DEFAULT_HTTP_TIMEOUT_MS));
        Ok(Self::new(cfg.publisher_id.as_str(), url.as_str(), timeout, client))
    }

    pub async fn deliver(&self, bundle: &[u8]) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(bundle.to_vec())
            .send()
            .await?;
        if !response.status().is_success() {
            bail!("HTTP publish to '{}' failed: {}", self.url, response.status());
        }
        info!("HTTP publisher '{}' delivered bundle to '{}'", self.name, self.url);
        Ok(())
    }
}

impl DistributionEndpoint for HttpEndpoint {
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
