use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─── Workflow runs ────────────────────────────────────────────────────────

/// Response body of `GET /repos/{owner}/{repo}/actions/runs`.
///
/// Fields the dashboard does not model are kept in `extra` so the list can be
/// handed to clients unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WorkflowRunList {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub workflow_runs: Vec<WorkflowRun>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One execution of a workflow, as returned by the runs endpoint and carried
/// in `workflow_run` webhook deliveries.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct WorkflowRun {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    /// `queued`, `in_progress`, `completed`, `requested`, `waiting`, ...
    #[serde(default)]
    pub status: String,
    /// Only set once `status == "completed"`.
    #[serde(default)]
    pub conclusion: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WorkflowRun {
    pub fn is_in_progress(&self) -> bool {
        self.status == "in_progress"
    }

    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}
