use axum::body::Bytes;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_BRANCH: &str = "main";

#[derive(Debug, Default, Deserialize)]
pub struct DeployBody {
    #[serde(default)]
    pub branch: Option<String>,
}

/// POST /api/deploy — start a simulated deployment.
///
/// The body is optional; `{}` or nothing at all deploys `main`. Responds as
/// soon as the run is scheduled.
pub async fn trigger_deploy(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let request: DeployBody = if body.iter().all(u8::is_ascii_whitespace) {
        DeployBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::bad_request(format!("invalid deploy request: {e}")))?
    };

    let branch = request
        .branch
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| DEFAULT_BRANCH.to_string());

    let record = app.sequencer.launch(&branch);

    Ok(Json(serde_json::json!({
        "success": true,
        "deploymentId": record.id,
    })))
}
