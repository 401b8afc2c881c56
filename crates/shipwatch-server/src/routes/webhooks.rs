use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use github_actions::WorkflowRun;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use shipwatch_core::{BroadcastEvent, DeploymentId};
use tracing::{debug, info, warn};

use crate::auth::check_webhook;
use crate::error::AppError;
use crate::state::AppState;

pub const EVENT_HEADER: &str = "x-github-event";

fn received() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "received": true }))
}

// ---------------------------------------------------------------------------
// GitHub
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct WorkflowRunDelivery {
    #[serde(default)]
    action: String,
    workflow_run: WorkflowRun,
}

/// POST /api/webhook/github — relay `workflow_run` deliveries.
///
/// Relayed runs skip the poller's snapshot comparison, so every delivery is
/// re-broadcast. Other event types, and bodies that do not parse, are
/// acknowledged and dropped.
pub async fn github_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    check_webhook(app.webhook_secret.as_deref(), &headers, &body)?;

    let event = headers
        .get(EVENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if event != "workflow_run" {
        debug!(event, "ignoring GitHub webhook");
        return Ok(received());
    }

    match serde_json::from_slice::<WorkflowRunDelivery>(&body) {
        Ok(delivery) => {
            info!(
                run_id = delivery.workflow_run.id,
                action = %delivery.action,
                "workflow_run webhook received"
            );
            app.bus
                .publish(BroadcastEvent::workflow(delivery.action, &delivery.workflow_run));
        }
        Err(e) => warn!(error = %e, "unreadable workflow_run webhook"),
    }
    Ok(received())
}

// ---------------------------------------------------------------------------
// Deployment status
// ---------------------------------------------------------------------------

/// Any scalar as text; `null` as absent. Objects and arrays keep their JSON
/// form.
fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

/// A number, or a string holding one. Anything else is absent.
fn loose_number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
    let n = match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(n.filter(|n| n.is_finite()))
}

/// Status callback from an external deploy pipeline. Every field except
/// `action` is optional; what is missing is left blank on the event.
/// Side fields are not validated: ids may be numbers, progress may be a
/// numeric string.
#[derive(Debug, Default, Deserialize)]
pub struct DeploymentNotice {
    #[serde(default, deserialize_with = "loose_string")]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub branch: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub step: Option<String>,
    #[serde(default, deserialize_with = "loose_number")]
    pub progress: Option<f64>,
    #[serde(default, deserialize_with = "loose_string")]
    pub error: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub url: Option<String>,
}

impl DeploymentNotice {
    /// The broadcast this notice maps to, if its action is recognised.
    pub fn into_event(self) -> Option<BroadcastEvent> {
        let id = self.id.map(DeploymentId::from);
        match self.action.as_deref()? {
            "started" => Some(BroadcastEvent::started(id, self.branch)),
            "progress" => {
                let step = self.step.unwrap_or_default();
                let progress = self.progress.unwrap_or(0.0).clamp(0.0, 100.0).round() as u8;
                Some(BroadcastEvent::progress(id, step.clone(), progress, step))
            }
            "completed" => Some(BroadcastEvent::completed(id, self.url.unwrap_or_default())),
            "failed" => Some(BroadcastEvent::failed(id, self.error.unwrap_or_default())),
            _ => None,
        }
    }
}

/// POST /api/webhook/deployment — translate a status callback into the
/// matching `deployment:*` broadcast. Unknown actions are acknowledged and
/// dropped.
pub async fn deployment_webhook(
    State(app): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    check_webhook(app.webhook_secret.as_deref(), &headers, &body)?;

    let notice = match serde_json::from_slice::<DeploymentNotice>(&body) {
        Ok(notice) => notice,
        Err(e) => {
            warn!(error = %e, "unreadable deployment webhook");
            return Ok(received());
        }
    };

    let action = notice.action.clone().unwrap_or_default();
    match notice.into_event() {
        Some(event) => {
            debug!(action = %action, event = event.name(), "deployment webhook relayed");
            app.bus.publish(event);
        }
        None => debug!(action = %action, "ignoring deployment webhook action"),
    }
    Ok(received())
}
