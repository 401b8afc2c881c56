//! The simulated deployment pipeline as an explicit state machine.
//!
//! ```text
//! Idle ──start──▶ Running(0) ──finish_step──▶ Running(1) … Running(5) ──finish_step──▶ Completed
//!   │                 │
//!   └──────fail───────┴────────────────────fail──────────────────────────────▶ Failed
//! ```
//!
//! Transitions never wait; each returns the events it produces, in emission
//! order. Waiting between `start`/`finish_step` is the driver's job
//! (see [`crate::sequencer::Sequencer`]).

use std::time::Duration;

use crate::deployment::DeploymentId;
use crate::event::{BroadcastEvent, LogKind};

// ---------------------------------------------------------------------------
// Step table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub name: &'static str,
    pub duration: Duration,
    /// Cumulative percentage reached once this step begins.
    pub progress: u8,
}

const fn step(name: &'static str, millis: u64, progress: u8) -> Step {
    Step {
        name,
        duration: Duration::from_millis(millis),
        progress,
    }
}

pub static STEPS: [Step; 6] = [
    step("Checking out code", 2000, 10),
    step("Installing dependencies", 5000, 30),
    step("Running tests", 3000, 50),
    step("Building application", 4000, 70),
    step("Deploying to platform", 6000, 90),
    step("Finalizing deployment", 2000, 100),
];

/// `https://ci-cd-<last 6 chars of id>.vercel.app`
pub fn deployment_url(id: &DeploymentId) -> String {
    format!("https://ci-cd-{}.vercel.app", id.suffix(6))
}

// ---------------------------------------------------------------------------
// DeploymentRun
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running { step: usize },
    Completed { url: String },
    Failed { error: String },
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed { .. } | RunState::Failed { .. })
    }
}

#[derive(Debug, Clone)]
pub struct DeploymentRun {
    id: DeploymentId,
    state: RunState,
}

impl DeploymentRun {
    pub fn new(id: DeploymentId) -> Self {
        Self {
            id,
            state: RunState::Idle,
        }
    }

    pub fn id(&self) -> &DeploymentId {
        &self.id
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// The step currently executing, if any.
    pub fn current_step(&self) -> Option<&'static Step> {
        match self.state {
            RunState::Running { step } => STEPS.get(step),
            _ => None,
        }
    }

    /// `Idle → Running(0)`. Ignored in any other state.
    pub fn start(&mut self) -> Vec<BroadcastEvent> {
        if self.state != RunState::Idle {
            return Vec::new();
        }
        self.enter_step(0)
    }

    /// Close the running step: log its success, then move on to the next
    /// step or to `Completed`. Ignored unless running.
    pub fn finish_step(&mut self) -> Vec<BroadcastEvent> {
        let RunState::Running { step } = self.state else {
            return Vec::new();
        };
        let done = &STEPS[step];
        let mut events = vec![BroadcastEvent::log(
            Some(self.id.clone()),
            LogKind::Success,
            format!("✅ {} completed", done.name),
        )];

        if step + 1 < STEPS.len() {
            events.extend(self.enter_step(step + 1));
        } else {
            let url = deployment_url(&self.id);
            events.push(BroadcastEvent::completed(Some(self.id.clone()), url.clone()));
            self.state = RunState::Completed { url };
        }
        events
    }

    /// Abort from `Idle` or `Running`. Ignored once terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> Vec<BroadcastEvent> {
        if self.is_terminal() {
            return Vec::new();
        }
        let error = error.into();
        let event = BroadcastEvent::failed(Some(self.id.clone()), error.clone());
        self.state = RunState::Failed { error };
        vec![event]
    }

    fn enter_step(&mut self, index: usize) -> Vec<BroadcastEvent> {
        let next = &STEPS[index];
        self.state = RunState::Running { step: index };
        vec![BroadcastEvent::progress(
            Some(self.id.clone()),
            next.name,
            next.progress,
            format!("{}...", next.name),
        )]
    }
}
