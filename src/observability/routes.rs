use std::sync::Arc;

use crate::config::settings::MetricsConfig;
use crate::renewal::state::ScheduleState;
use crate::server::server::AppState;
use axum::routing::get;
use axum::{extract::State, response::IntoResponse, Json, Router};
use chrono::{DateTime, Utc};
use http::{header::CONTENT_TYPE, StatusCode};
use prometheus::{Encoder, Registry, TextEncoder};
use serde::Serialize;
use tracing::error;

#[derive(Clone)]
pub struct MetricsState {
    pub registry: Arc<Registry>,
}

impl MetricsState {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn router(&self, metrics_config: &MetricsConfig) -> Router<AppState> {
        let mut router = Router::new().route("/status", get(get_status));
        if metrics_config.is_enabled {
            router = router.route(metrics_config.path.as_str(), get(get_metrics));
        }
        router
    }
}

async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = state.metrics_state.registry.gather();
    let mut buffer = Vec::new();

    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        error!("failed to encode metrics: {}", err);
        return (StatusCode::INTERNAL_SERVER_ERROR, [(CONTENT_TYPE, "text/plain")], String::new());
    }

    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        String::from_utf8_lossy(&buffer).into_owned(),
    )
}

/// Schedule state plus a token-free summary of the last published bundle.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub schedule: ScheduleState,
    pub published: Option<PublishedSummary>,
}

#[derive(Debug, Serialize)]
pub struct PublishedSummary {
    pub services: Vec<String>,
    pub published_at: DateTime<Utc>,
    pub renewal_deadline: Option<DateTime<Utc>>,
    pub earliest_expiry: Option<DateTime<Utc>>,
}

async fn get_status(State(state): State<AppState>) -> Json<StatusResponse> {
    let schedule = state.manager.state().await;
    let published = state.manager.last_published().map(|published| PublishedSummary {
        services: published.bundle.services().map(str::to_owned).collect(),
        published_at: published.published_at,
        renewal_deadline: published.renewal_deadline,
        earliest_expiry: published.bundle.tokens().iter().map(|t| t.expires_at).min(),
    });
    Json(StatusResponse { schedule, published })
}
