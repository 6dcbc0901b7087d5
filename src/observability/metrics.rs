use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the process-wide `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Renewal rounds
    pub rounds: IntCounterVec,
    pub round_duration: Histogram,
    pub retry_count: IntGauge,
    pub next_renewal_unix: IntGauge,

    // Providers
    pub provider_failures: IntCounterVec,
    pub provider_tokens: IntGaugeVec,

    // Publishing
    pub publishes: IntCounterVec,
    pub publish_failures: IntCounterVec,

    // Local identity
    pub tgt_relogins: IntCounterVec,

    // Config/runtime
    pub parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("tokenrenewer".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Rounds
            rounds: IntCounterVec::new(Opts::new("renewal_rounds_total", "Token acquisition rounds by outcome"), &["outcome"]).unwrap(),
            round_duration: Histogram::with_opts(HistogramOpts::new("renewal_round_duration_seconds", "Token acquisition round duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0])).unwrap(),
            retry_count: IntGauge::new("renewal_retry_count", "Failed rounds since the last success").unwrap(),
            next_renewal_unix: IntGauge::new("renewal_next_fire_unix_seconds", "Scheduled time of the next round, 0 when not armed").unwrap(),

            // Providers
            provider_failures: IntCounterVec::new(Opts::new("provider_failures_total", "Provider failures by service and stage"), &["service", "stage"]).unwrap(),
            provider_tokens: IntGaugeVec::new(Opts::new("provider_tokens", "Tokens contributed by the service in the last successful round"), &["service"]).unwrap(),

            // Publishing
            publishes: IntCounterVec::new(Opts::new("bundle_publishes_total", "Bundles handed to a distribution endpoint"), &["endpoint"]).unwrap(),
            publish_failures: IntCounterVec::new(Opts::new("bundle_publish_failures_total", "Bundle deliveries that failed in the endpoint"), &["endpoint"]).unwrap(),

            // Identity
            tgt_relogins: IntCounterVec::new(Opts::new("tgt_relogins_total", "TGT renewals from keytab by outcome"), &["outcome"]).unwrap(),

            // Config/runtime
            parse_failures: IntCounter::new("config_parse_failures_total", "Config parse failures").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup").unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.rounds.clone())).unwrap();
        reg.register(Box::new(metrics.round_duration.clone())).unwrap();
        reg.register(Box::new(metrics.retry_count.clone())).unwrap();
        reg.register(Box::new(metrics.next_renewal_unix.clone())).unwrap();
        reg.register(Box::new(metrics.provider_failures.clone())).unwrap();
        reg.register(Box::new(metrics.provider_tokens.clone())).unwrap();
        reg.register(Box::new(metrics.publishes.clone())).unwrap();
        reg.register(Box::new(metrics.publish_failures.clone())).unwrap();
        reg.register(Box::new(metrics.tgt_relogins.clone())).unwrap();
        reg.register(Box::new(metrics.parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
