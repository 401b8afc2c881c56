use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use github_actions::ClientConfig;
use shipwatch_core::{ChangeDetector, DEFAULT_POLL_INTERVAL, DEFAULT_SNAPSHOT_CAPACITY};
use shipwatch_server::{AppState, ServerConfig};

const DEFAULT_ORIGIN: &str = "http://localhost:5173";

#[derive(Parser, Debug)]
#[command(
    name = "shipwatch",
    about = "Deployment dashboard backend: simulated deploys and GitHub Actions updates over SSE/WebSocket",
    version
)]
struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// GitHub token; unauthenticated requests hit the rate limit quickly
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Repository owner whose workflow runs are watched
    #[arg(long, env = "GITHUB_OWNER", default_value = "utkarsh232005")]
    github_owner: String,

    /// Repository whose workflow runs are watched
    #[arg(long, env = "GITHUB_REPO", default_value = "CI-CD")]
    github_repo: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = github_actions::DEFAULT_API_URL)]
    github_api_url: String,

    /// Comma-separated browser origins allowed by CORS (`*` for any).
    /// Falls back to FRONTEND_URL.
    #[arg(long, env = "ALLOWED_ORIGINS")]
    allowed_origins: Option<String>,

    /// Seconds between workflow polls
    #[arg(long, env = "POLL_INTERVAL_SECS", default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval_secs: u64,

    /// Workflow runs remembered for change detection
    #[arg(long, env = "SNAPSHOT_CAPACITY", default_value_t = DEFAULT_SNAPSHOT_CAPACITY)]
    snapshot_capacity: usize,

    /// Secret for verifying X-Hub-Signature-256 on incoming webhooks
    #[arg(long, env = "GITHUB_WEBHOOK_SECRET", hide_env_values = true)]
    webhook_secret: Option<String>,
}

impl Cli {
    fn server_config(&self, frontend_url: Option<String>) -> ServerConfig {
        let raw = self
            .allowed_origins
            .clone()
            .or(frontend_url)
            .unwrap_or_else(|| DEFAULT_ORIGIN.to_string());
        let mut allowed_origins = ServerConfig::parse_origins(&raw);
        if allowed_origins.is_empty() {
            allowed_origins.push(DEFAULT_ORIGIN.to_string());
        }
        ServerConfig {
            allowed_origins,
            webhook_secret: self.webhook_secret.clone(),
        }
    }

    fn client_config(&self) -> ClientConfig {
        ClientConfig::new(&self.github_owner, &self.github_repo)
            .with_api_url(&self.github_api_url)
            .with_token(self.github_token.clone())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        tracing::error!("{e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.server_config(std::env::var("FRONTEND_URL").ok());
    let github = github_actions::Client::new(cli.client_config())
        .context("failed to build GitHub client")?;
    if cli.github_token.as_deref().map_or(true, str::is_empty) {
        tracing::warn!("GITHUB_TOKEN not set; workflow polling will be rate limited");
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async move {
        let state = AppState::new(github.clone(), &config);

        let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", cli.port))
            .await
            .with_context(|| format!("failed to bind port {}", cli.port))?;

        let detector = ChangeDetector::new(github, state.bus.clone())
            .with_snapshot_capacity(cli.snapshot_capacity);
        let poller = tokio::spawn(detector.run(cli.poll_interval()));

        tracing::info!(
            owner = %cli.github_owner,
            repo = %cli.github_repo,
            origins = ?config.allowed_origins,
            "watching workflow runs"
        );

        let result = tokio::select! {
            res = shipwatch_server::serve_on(listener, state, &config) => res,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                Ok(())
            }
        };

        poller.abort();
        result
    })
}
