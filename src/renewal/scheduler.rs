use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::CredentialError;
use crate::helpers::time::{delay_until, now};
use crate::observability::metrics::get_metrics;
use crate::providers::CredentialProvider;
use crate::publishers::DistributionEndpoint;
use crate::renewal::round::{RoundOutcome, TokenAcquisitionRound};
use crate::renewal::state::{PublishedCredentials, ScheduleState};
use crate::resilience::retry::RetryWait;

static SUCCEEDED: &str = "succeeded";
static FAILED: &str = "failed";
static INTERRUPTED: &str = "interrupted";

/// Drives acquisition rounds: `Idle -> Running -> {Succeeded, Failed} -> Idle`.
///
/// Only one round runs at a time. The loop re-arms strictly after a round has
/// published, and never re-arms once shutdown has been requested.
pub struct RenewalScheduler<P: ?Sized = dyn CredentialProvider> {
    round: TokenAcquisitionRound<P>,
    endpoint: Arc<dyn DistributionEndpoint>,
    retry: RetryWait,
    min_delay: Duration,
    state: RwLock<ScheduleState>,
    round_lock: Mutex<()>,
    published: watch::Sender<Option<Arc<PublishedCredentials>>>,
    wake: Notify,
    looping: AtomicBool,
    shutdown: CancellationToken,
}

impl<P: CredentialProvider + ?Sized + 'static> RenewalScheduler<P> {
    pub fn new(
        round: TokenAcquisitionRound<P>,
        endpoint: Arc<dyn DistributionEndpoint>,
        retry: RetryWait,
        min_delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let (published, _) = watch::channel(None);
        Self {
            round,
            endpoint,
            retry,
            min_delay,
            state: RwLock::new(ScheduleState::reset(now())),
            round_lock: Mutex::new(()),
            published,
            wake: Notify::new(),
            looping: AtomicBool::new(false),
            shutdown,
        }
    }

    pub async fn state(&self) -> ScheduleState {
        self.state.read().await.clone()
    }

    pub fn last_published(&self) -> Option<Arc<PublishedCredentials>> {
        self.published.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<PublishedCredentials>>> {
        self.published.subscribe()
    }

    /// Ask the loop for a round now instead of at the scheduled time.
    /// Ignored while no loop is running.
    pub fn trigger(&self) {
        if !self.looping.load(Ordering::SeqCst) {
            debug!("renewal loop is not running, trigger ignored");
            return;
        }
        self.wake.notify_one();
    }

    /// Run a round immediately on the caller's task. Returns what was published,
    /// `None` when the round failed or shutdown was already requested.
    pub async fn run_now(&self) -> Option<Arc<PublishedCredentials>> {
        self.execute_round().await
    }

    pub fn spawn(self: &Arc<Self>) -> JoinHandle<()> {
        let scheduler = self.clone();
        self.looping.store(true, Ordering::SeqCst);
        tokio::spawn(async move { scheduler.run_loop().await })
    }

    async fn run_loop(self: Arc<Self>) {
        info!("renewal scheduler started");
        loop {
            let next_fire_at = self.state.read().await.next_fire_at;
            if let Some(at) = next_fire_at {
                debug!("next round at {}", at);
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = self.wake.notified() => info!("round triggered"),
                _ = sleep_until_next_fire(next_fire_at, self.min_delay) => {}
            }

            if self.shutdown.is_cancelled() {
                break;
            }
            self.execute_round().await;
        }
        self.looping.store(false, Ordering::SeqCst);
        self.state.write().await.stop();
        get_metrics().await.next_renewal_unix.set(0);
        info!("renewal scheduler stopped");
    }

    async fn execute_round(&self) -> Option<Arc<PublishedCredentials>> {
        let _running = self.round_lock.lock().await;
        if self.shutdown.is_cancelled() {
            debug!("shutdown requested, not starting a round");
            return None;
        }

        let metrics = get_metrics().await;
        self.state.write().await.begin(now());
        let timer = metrics.round_duration.start_timer();
        let result = self.round.run_round().await;
        timer.observe_duration();

        match result {
            Ok(outcome) => Some(self.on_success(outcome).await),
            Err(err) => {
                self.on_failure(err).await;
                None
            }
        }
    }

    async fn on_success(&self, outcome: RoundOutcome) -> Arc<PublishedCredentials> {
        let metrics = get_metrics().await;
        let serialized = match outcome.bundle.to_bytes() {
            Ok(bytes) => Arc::new(bytes),
            Err(err) => {
                // unreachable with JSON, but never publish a broken bundle
                warn!("{:#}", err);
                Arc::new(Vec::new())
            }
        };
        if !serialized.is_empty() {
            self.endpoint.publish(serialized.clone());
        }

        let finished = now();
        let published = Arc::new(PublishedCredentials {
            bundle: outcome.bundle,
            serialized,
            renewal_deadline: outcome.deadline,
            published_at: finished,
        });
        self.published.send_replace(Some(published.clone()));

        let mut state = self.state.write().await;
        state.succeed(finished, outcome.deadline, self.min_delay);
        metrics.rounds.with_label_values(&[SUCCEEDED]).inc();
        metrics.retry_count.set(0);
        info!(
            principal = %outcome.identity.principal,
            tokens = published.bundle.len(),
            failed_providers = ?outcome.failed_providers,
            "tokens obtained, next renewal at {}",
            fmt_fire_at(state.next_fire_at)
        );
        self.rearm_or_stop(&mut state).await;
        published
    }

    async fn on_failure(&self, err: CredentialError) {
        let metrics = get_metrics().await;
        let finished = now();
        let mut state = self.state.write().await;

        if self.shutdown.is_cancelled() && err.is_interrupted() {
            debug!("round interrupted by shutdown");
            metrics.rounds.with_label_values(&[INTERRUPTED]).inc();
            state.stop();
            return;
        }

        state.fail(finished, &self.retry, err.to_string());
        metrics.rounds.with_label_values(&[FAILED]).inc();
        metrics.retry_count.set(state.retry_count as i64);
        warn!(
            retry_count = state.retry_count,
            "failed to obtain tokens: {}; retrying at {}",
            err,
            fmt_fire_at(state.next_fire_at)
        );
        self.rearm_or_stop(&mut state).await;
    }

    async fn rearm_or_stop(&self, state: &mut ScheduleState) {
        let metrics = get_metrics().await;
        if self.shutdown.is_cancelled() {
            state.stop();
            metrics.next_renewal_unix.set(0);
            return;
        }
        state.rearm();
        metrics
            .next_renewal_unix
            .set(state.next_fire_at.map(|at| at.timestamp()).unwrap_or(0));
    }
}

async fn sleep_until_next_fire(next_fire_at: Option<DateTime<Utc>>, min_delay: Duration) {
    match next_fire_at {
        Some(at) => tokio::time::sleep(delay_until(at, now(), min_delay)).await,
        // nothing to renew: wait for a trigger or shutdown
        None => futures::future::pending::<()>().await,
    }
}

fn fmt_fire_at(next_fire_at: Option<DateTime<Utc>>) -> String {
    next_fire_at
        .map(|at| at.to_rfc3339())
        .unwrap_or_else(|| "<not scheduled>".to_owned())
}
