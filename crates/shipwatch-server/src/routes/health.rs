use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub active_deployments: usize,
    pub subscribers: usize,
}

/// GET /health — liveness plus current load.
pub async fn health(State(app): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        status: "ok",
        timestamp: Utc::now(),
        active_deployments: app.registry().count(),
        subscribers: app.bus.subscriber_count(),
    })
}
