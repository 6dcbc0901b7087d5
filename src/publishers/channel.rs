use std::sync::Arc;

use tokio::sync::broadcast::{self, Receiver, Sender};
use tracing::debug;

use crate::publishers::DistributionEndpoint;

const BUFFER_SIZE: usize = 16;

/// In-process endpoint: the embedding application subscribes and forwards
/// bundles over its own transport.
#[derive(Clone)]
pub struct ChannelEndpoint {
    sender: Sender<Arc<Vec<u8>>>,
}

impl ChannelEndpoint {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUFFER_SIZE);
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<Arc<Vec<u8>>> {
        self.sender.subscribe()
    }
}

impl Default for ChannelEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributionEndpoint for ChannelEndpoint {
    fn name(&self) -> &str {
        "channel"
    }

    fn publish(&self, bundle: Arc<Vec<u8>>) {
        if let Err(err) = self.sender.send(bundle) {
            debug!("no subscribers for published bundle: {}", err);
        }
    }
}
