use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::error::{GithubError, Result};
use crate::types::WorkflowRunList;

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

// ─── Configuration ────────────────────────────────────────────────────────

/// Where and as whom the client talks to GitHub.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Personal access token. Unauthenticated requests work but hit the
    /// rate limit after 60 requests per hour.
    pub token: Option<String>,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            owner: owner.into(),
            repo: repo.into(),
            token: None,
            user_agent: concat!("shipwatch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }
}

// ─── Client ───────────────────────────────────────────────────────────────

/// Thin wrapper around `reqwest::Client` bound to one repository.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        if let Some(token) = &config.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self { http, config })
    }

    pub fn owner(&self) -> &str {
        &self.config.owner
    }

    pub fn repo(&self) -> &str {
        &self.config.repo
    }

    /// `GET /repos/{owner}/{repo}/actions/runs?per_page=N`, newest first.
    pub async fn list_workflow_runs(&self, per_page: u8) -> Result<WorkflowRunList> {
        let url = format!(
            "{}/repos/{}/{}/actions/runs",
            self.config.api_url.trim_end_matches('/'),
            self.config.owner,
            self.config.repo
        );
        debug!(url = %url, per_page, "listing workflow runs");

        let response = self
            .http
            .get(&url)
            .query(&[("per_page", per_page)])
            .send()
            .await?;
        let response = check_status(response).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

// ─── Response classification ──────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiMessage {
    message: String,
}

/// Turn a non-2xx response into `GithubError`, separating rate-limit
/// rejections from every other API failure.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiMessage>(&body)
        .map(|m| m.message)
        .unwrap_or(body);

    if is_rate_limit(status, &headers, &message) {
        let reset = headers
            .get("x-ratelimit-reset")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(GithubError::RateLimited {
            status: status.as_u16(),
            reset,
        });
    }

    Err(GithubError::Api {
        status: status.as_u16(),
        message,
    })
}

/// GitHub signals both primary and secondary rate limits with 403 or 429;
/// a plain 403 is also used for permission failures, so the status alone is
/// not enough.
pub(crate) fn is_rate_limit(status: StatusCode, headers: &HeaderMap, message: &str) -> bool {
    if status != StatusCode::FORBIDDEN && status != StatusCode::TOO_MANY_REQUESTS {
        return false;
    }
    let exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.trim() == "0");
    exhausted
        || headers.contains_key("retry-after")
        || message.to_ascii_lowercase().contains("rate limit")
}
