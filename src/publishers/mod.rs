//! Distribution endpoints
//!
//! `publish` is one-way: it hands the serialized bundle over and returns
//! without waiting for delivery. Delivery errors are the endpoint's concern;
//! they are logged and counted, never reported back to the scheduler.
//!
//! Each network or file endpoint owns a single delivery task draining its
//! queue, so bundles reach the destination in publish order.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use anyhow::Result;
use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error};

use crate::config::publishers::{PublisherConfig, PublisherType};
use crate::observability::metrics::get_metrics;

pub mod channel;
pub mod file;
pub mod http;
pub mod uds;

pub use channel::ChannelEndpoint;
pub use file::FileEndpoint;
pub use http::HttpEndpoint;
pub use uds::UdsEndpoint;

pub trait DistributionEndpoint: Send + Sync {
    fn name(&self) -> &str;

    fn publish(&self, bundle: Arc<Vec<u8>>);
}

/// Publishes every bundle to all inner endpoints.
#[derive(Clone, Default)]
pub struct FanoutEndpoint {
    endpoints: Vec<Arc<dyn DistributionEndpoint>>,
}

impl FanoutEndpoint {
    pub fn new(endpoints: Vec<Arc<dyn DistributionEndpoint>>) -> Self {
        Self { endpoints }
    }

    pub fn push(&mut self, endpoint: Arc<dyn DistributionEndpoint>) {
        self.endpoints.push(endpoint);
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl DistributionEndpoint for FanoutEndpoint {
    fn name(&self) -> &str {
        "fanout"
    }

    fn publish(&self, bundle: Arc<Vec<u8>>) {
        for endpoint in &self.endpoints {
            endpoint.publish(bundle.clone());
        }
    }
}

/// Build the endpoints declared in configuration.
pub fn build_publishers(
    configs: impl IntoIterator<Item = PublisherConfig>,
    client: &Client,
) -> Result<FanoutEndpoint> {
    let mut fanout = FanoutEndpoint::default();
    for cfg in configs {
        let endpoint: Arc<dyn DistributionEndpoint> = match cfg.publisher_type {
            PublisherType::File => Arc::new(FileEndpoint::from_config(&cfg)?),
            PublisherType::Uds => Arc::new(UdsEndpoint::from_config(&cfg)?),
            PublisherType::Http => Arc::new(HttpEndpoint::from_config(&cfg, client.clone())?),
        };
        fanout.push(endpoint);
    }
    Ok(fanout)
}

/// Queue feeding the delivery task of one endpoint.
///
/// The task is spawned on the first `push`. A clone starts with an empty
/// queue and gets its own task.
#[derive(Debug, Default)]
pub(crate) struct DeliveryQueue {
    sender: OnceLock<UnboundedSender<Arc<Vec<u8>>>>,
}

impl Clone for DeliveryQueue {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl DeliveryQueue {
    pub(crate) fn push<F, Fut>(&self, endpoint: &str, bundle: Arc<Vec<u8>>, deliver: F)
    where
        F: Fn(Arc<Vec<u8>>) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let sender = self.sender.get_or_init(|| {
            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(delivery_worker(endpoint.to_owned(), rx, deliver));
            tx
        });
        if sender.send(bundle).is_err() {
            debug!(endpoint = %endpoint, "delivery task is gone, bundle dropped");
        }
    }
}

async fn delivery_worker<F, Fut>(endpoint: String, mut rx: UnboundedReceiver<Arc<Vec<u8>>>, deliver: F)
where
    F: Fn(Arc<Vec<u8>>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let metrics = get_metrics().await;
    while let Some(mut bundle) = rx.recv().await {
        // only the newest queued bundle is worth delivering
        while let Ok(newer) = rx.try_recv() {
            bundle = newer;
        }
        match deliver(bundle).await {
            Ok(()) => metrics.publishes.with_label_values(&[endpoint.as_str()]).inc(),
            Err(err) => {
                error!(endpoint = %endpoint, "bundle delivery failed: {:#}", err);
                metrics.publish_failures.with_label_values(&[endpoint.as_str()]).inc();
            }
        }
    }
    debug!(endpoint = %endpoint, "delivery task stopped");
}
