use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::identity::IdentityLibrary;
use crate::observability::metrics::get_metrics;

/// Keeps the process's own TGT alive on a fixed period. Only armed for keytab
/// logins; failures are logged and left for the next tick.
pub struct TicketRefresher {
    library: Arc<dyn IdentityLibrary>,
    period: Duration,
    shutdown: CancellationToken,
}

impl TicketRefresher {
    pub fn new(library: Arc<dyn IdentityLibrary>, period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            library,
            period,
            shutdown,
        }
    }

    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("ticket refresher started, period {:?}", self.period);
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = self.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        if let Err(err) = self.tick().await {
                            warn!("TGT renewal failed: {}", err);
                        }
                    }
                }
            }
            info!("ticket refresher stopped");
        })
    }

    /// Renew the TGT if it is due. Returns whether a relogin happened.
    pub async fn tick(&self) -> Result<bool> {
        if !self.library.tgt_needs_renewal().await? {
            debug!("TGT not due for renewal");
            return Ok(false);
        }
        let metrics = get_metrics().await;
        match self.library.relogin_from_keytab().await {
            Ok(()) => {
                metrics.tgt_relogins.with_label_values(&["renewed"]).inc();
                Ok(true)
            }
            Err(err) => {
                metrics.tgt_relogins.with_label_values(&["failed"]).inc();
                Err(err)
            }
        }
    }
}
