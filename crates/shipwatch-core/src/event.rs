use chrono::{DateTime, Utc};
use github_actions::WorkflowRun;
use serde::Serialize;

use crate::deployment::DeploymentId;

// ---------------------------------------------------------------------------
// BroadcastEvent
// ---------------------------------------------------------------------------

/// Everything pushed to dashboard subscribers.
///
/// Serializes as `{"event": "<name>", "data": {...}}`, which is the frame
/// sent over WebSocket. SSE uses `name()` and `data_json()` separately.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum BroadcastEvent {
    #[serde(rename = "deployment:started")]
    DeploymentStarted(DeploymentStarted),
    #[serde(rename = "deployment:progress")]
    DeploymentProgress(DeploymentProgress),
    #[serde(rename = "deployment:log")]
    DeploymentLog(DeploymentLog),
    #[serde(rename = "deployment:completed")]
    DeploymentCompleted(DeploymentCompleted),
    #[serde(rename = "deployment:failed")]
    DeploymentFailed(DeploymentFailed),
    #[serde(rename = "github:workflow")]
    Workflow(WorkflowEvent),
}

impl BroadcastEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::DeploymentStarted(_) => "deployment:started",
            BroadcastEvent::DeploymentProgress(_) => "deployment:progress",
            BroadcastEvent::DeploymentLog(_) => "deployment:log",
            BroadcastEvent::DeploymentCompleted(_) => "deployment:completed",
            BroadcastEvent::DeploymentFailed(_) => "deployment:failed",
            BroadcastEvent::Workflow(_) => "github:workflow",
        }
    }

    /// The payload alone, without the event-name envelope.
    pub fn data_json(&self) -> serde_json::Result<String> {
        match self {
            BroadcastEvent::DeploymentStarted(d) => serde_json::to_string(d),
            BroadcastEvent::DeploymentProgress(d) => serde_json::to_string(d),
            BroadcastEvent::DeploymentLog(d) => serde_json::to_string(d),
            BroadcastEvent::DeploymentCompleted(d) => serde_json::to_string(d),
            BroadcastEvent::DeploymentFailed(d) => serde_json::to_string(d),
            BroadcastEvent::Workflow(d) => serde_json::to_string(d),
        }
    }

    pub fn deployment_id(&self) -> Option<&DeploymentId> {
        match self {
            BroadcastEvent::DeploymentStarted(d) => d.id.as_ref(),
            BroadcastEvent::DeploymentProgress(d) => d.id.as_ref(),
            BroadcastEvent::DeploymentLog(d) => d.id.as_ref(),
            BroadcastEvent::DeploymentCompleted(d) => d.id.as_ref(),
            BroadcastEvent::DeploymentFailed(d) => d.id.as_ref(),
            BroadcastEvent::Workflow(_) => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BroadcastEvent::DeploymentCompleted(_) | BroadcastEvent::DeploymentFailed(_)
        )
    }

    pub fn started(id: Option<DeploymentId>, branch: Option<String>) -> Self {
        BroadcastEvent::DeploymentStarted(DeploymentStarted {
            id,
            branch,
            timestamp: Utc::now(),
        })
    }

    pub fn progress(
        id: Option<DeploymentId>,
        step: impl Into<String>,
        progress: u8,
        message: impl Into<String>,
    ) -> Self {
        BroadcastEvent::DeploymentProgress(DeploymentProgress {
            id,
            step: step.into(),
            progress: progress.min(100),
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn log(id: Option<DeploymentId>, kind: LogKind, message: impl Into<String>) -> Self {
        BroadcastEvent::DeploymentLog(DeploymentLog {
            id,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn completed(id: Option<DeploymentId>, url: impl Into<String>) -> Self {
        BroadcastEvent::DeploymentCompleted(DeploymentCompleted {
            id,
            url: url.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn failed(id: Option<DeploymentId>, error: impl Into<String>) -> Self {
        BroadcastEvent::DeploymentFailed(DeploymentFailed {
            id,
            error: error.into(),
            timestamp: Utc::now(),
        })
    }

    pub fn workflow(action: impl Into<String>, run: &WorkflowRun) -> Self {
        BroadcastEvent::Workflow(WorkflowEvent {
            action: action.into(),
            workflow: WorkflowSummary::from(run),
            timestamp: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

// `id` is absent only on events relayed from the deployment webhook.

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentStarted {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeploymentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentProgress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeploymentId>,
    pub step: String,
    pub progress: u8,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentLog {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeploymentId>,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentCompleted {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeploymentId>,
    pub url: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentFailed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<DeploymentId>,
    pub error: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowEvent {
    pub action: String,
    pub workflow: WorkflowSummary,
    pub timestamp: DateTime<Utc>,
}

/// The subset of a workflow run that dashboards render.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowSummary {
    pub id: u64,
    pub name: Option<String>,
    pub status: String,
    pub conclusion: Option<String>,
    pub html_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&WorkflowRun> for WorkflowSummary {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            id: run.id,
            name: run.name.clone(),
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
            html_url: run.html_url.clone(),
            created_at: run.created_at,
            updated_at: run.updated_at,
        }
    }
}
