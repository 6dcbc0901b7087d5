use std::future::Future;
use std::sync::Arc;

use crate::config::settings::SettingsConfig;
use crate::observability::metrics::{get_metrics, Metrics};
use crate::observability::routes::MetricsState;
use crate::renewal::ServiceCredentialsManager;
use anyhow::{Context, Result};
use axum::Router;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub manager: Arc<ServiceCredentialsManager>,
}

impl AppState {
    pub fn new(metrics: &Metrics, manager: Arc<ServiceCredentialsManager>) -> Self {
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            manager,
        }
    }
}

pub fn router(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

/// Serve status and metrics until `shutdown` resolves. No-op without a
/// `settings.server` block.
pub async fn start<F>(
    settings_config: &SettingsConfig,
    manager: Arc<ServiceCredentialsManager>,
    shutdown: F,
) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let Some(server) = &settings_config.server else {
        return Ok(());
    };
    let metrics = get_metrics().await;
    let app = router(settings_config, AppState::new(metrics, manager));

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind '{}'", addr))?;
    info!("status server listening on {}", addr);
    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("status server")?;
    metrics.up.set(0);
    Ok(())
}
