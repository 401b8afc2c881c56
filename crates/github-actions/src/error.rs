use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited by GitHub (HTTP {status})")]
    RateLimited {
        status: u16,
        /// Epoch seconds from `x-ratelimit-reset`, when GitHub sent it.
        reset: Option<u64>,
    },

    #[error("GitHub API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode GitHub response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GithubError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GithubError::RateLimited { .. })
    }
}

pub type Result<T> = std::result::Result<T, GithubError>;
