use axum::extract::State;
use axum::Json;
use github_actions::WorkflowRunList;
use tracing::warn;

use crate::state::AppState;

const LIST_PAGE_SIZE: u8 = 10;

/// GET /api/github/workflows — the provider's run list, passed through.
///
/// Fetch failures produce an empty list rather than an error so the
/// dashboard always has something to render.
pub async fn list_workflows(State(app): State<AppState>) -> Json<WorkflowRunList> {
    match app.github.list_workflow_runs(LIST_PAGE_SIZE).await {
        Ok(list) => Json(list),
        Err(e) => {
            warn!(
                owner = app.github.owner(),
                repo = app.github.repo(),
                error = %e,
                "failed to list workflow runs"
            );
            Json(WorkflowRunList::default())
        }
    }
}
