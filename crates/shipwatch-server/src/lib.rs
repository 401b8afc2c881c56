pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::{HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Server-side settings that do not belong to the core.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Origins allowed to call the API from a browser. `*` allows any.
    pub allowed_origins: Vec<String>,
    /// Shared secret for `X-Hub-Signature-256`. Webhooks are unauthenticated
    /// when unset.
    pub webhook_secret: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
            webhook_secret: None,
        }
    }
}

impl ServerConfig {
    /// Parse a comma-separated origin list, dropping blanks.
    pub fn parse_origins(raw: &str) -> Vec<String> {
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(
            origins
                .iter()
                .filter_map(|o| HeaderValue::from_str(o).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Build the axum Router with all routes and middleware.
/// Used by `serve_on()` and available for integration testing.
pub fn build_router(app_state: AppState, config: &ServerConfig) -> Router {
    Router::new()
        // Push channels
        .route("/api/events", get(routes::events::sse_events))
        .route("/ws", get(routes::ws::ws_events))
        // Deployments
        .route("/api/deploy", post(routes::deploy::trigger_deploy))
        // GitHub
        .route(
            "/api/github/workflows",
            get(routes::github::list_workflows),
        )
        // Webhooks
        .route(
            "/api/webhook/github",
            post(routes::webhooks::github_webhook),
        )
        .route(
            "/api/webhook/deployment",
            post(routes::webhooks::deployment_webhook),
        )
        // Health
        .route("/health", get(routes::health::health))
        .layer(cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Serve the dashboard API on a pre-bound listener until the future is
/// dropped or the listener fails.
pub async fn serve_on(
    listener: tokio::net::TcpListener,
    app_state: AppState,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let port = listener.local_addr()?.port();
    let app = build_router(app_state, config);

    tracing::info!("shipwatch listening on http://localhost:{port}");
    tracing::info!("health probe at http://localhost:{port}/health");

    axum::serve(listener, app).await?;
    Ok(())
}
