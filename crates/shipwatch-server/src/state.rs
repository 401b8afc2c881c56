use std::sync::Arc;

use shipwatch_core::{DeploymentRegistry, EventBus, Sequencer, StepExecutor};

use crate::ServerConfig;

/// Shared application state passed to all route handlers.
///
/// Everything here is created once at startup and injected, so each test can
/// build a fresh, isolated instance.
#[derive(Clone)]
pub struct AppState {
    pub bus: EventBus,
    pub sequencer: Sequencer,
    pub github: github_actions::Client,
    pub webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(github: github_actions::Client, config: &ServerConfig) -> Self {
        let bus = EventBus::default();
        let sequencer = Sequencer::new(DeploymentRegistry::new(), bus.clone());
        Self {
            bus,
            sequencer,
            github,
            webhook_secret: config
                .webhook_secret
                .as_deref()
                .filter(|s| !s.is_empty())
                .map(Arc::from),
        }
    }

    /// Replace how deployment steps are carried out (tests use instant steps).
    pub fn with_step_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.sequencer = self.sequencer.with_executor(executor);
        self
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        self.sequencer.registry()
    }
}
