//! Workflow change detection.
//!
//! Every tick the detector fetches the most recent runs, compares each run's
//! `(status, conclusion)` against the last snapshot, and publishes a
//! `github:workflow` event only for runs that are new or have changed.

use std::time::Duration;

use futures::future::BoxFuture;
use github_actions::{GithubError, WorkflowRun};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::bus::EventBus;
use crate::event::BroadcastEvent;
use crate::snapshot::{SnapshotStore, WorkflowSnapshot};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
pub const RUNS_PER_POLL: u8 = 5;

/// Anything that can list recent workflow runs, newest first.
pub trait WorkflowSource: Send + Sync + 'static {
    fn recent_runs(&self, limit: u8) -> BoxFuture<'_, Result<Vec<WorkflowRun>, GithubError>>;
}

impl WorkflowSource for github_actions::Client {
    fn recent_runs(&self, limit: u8) -> BoxFuture<'_, Result<Vec<WorkflowRun>, GithubError>> {
        Box::pin(async move { Ok(self.list_workflow_runs(limit).await?.workflow_runs) })
    }
}

/// Label attached to a `github:workflow` event for `run`'s current status.
pub fn action_for(run: &WorkflowRun) -> &'static str {
    if run.is_in_progress() {
        "in_progress"
    } else if run.is_completed() {
        "completed"
    } else {
        "requested"
    }
}

pub struct ChangeDetector<S> {
    source: S,
    bus: EventBus,
    snapshots: SnapshotStore,
    runs_per_poll: u8,
}

impl<S: WorkflowSource> ChangeDetector<S> {
    pub fn new(source: S, bus: EventBus) -> Self {
        Self {
            source,
            bus,
            snapshots: SnapshotStore::default(),
            runs_per_poll: RUNS_PER_POLL,
        }
    }

    pub fn with_snapshot_capacity(mut self, capacity: usize) -> Self {
        self.snapshots = SnapshotStore::new(capacity);
        self
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// Run one detection cycle and return the events it published.
    ///
    /// Fetch failures end the cycle early with no events; rate limiting is
    /// expected and only logged at debug level.
    pub async fn poll_once(&mut self) -> Vec<BroadcastEvent> {
        let runs = match self.source.recent_runs(self.runs_per_poll).await {
            Ok(runs) => runs,
            Err(e) if e.is_rate_limited() => {
                debug!(error = %e, "workflow poll skipped: rate limited");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "workflow poll failed");
                return Vec::new();
            }
        };

        let mut emitted = Vec::new();
        for run in &runs {
            let current = WorkflowSnapshot::from(run);
            let changed = self.snapshots.get(run.id) != Some(&current);
            self.snapshots.record(current);

            if changed {
                let action = action_for(run);
                debug!(run_id = run.id, action, status = %run.status, "workflow run changed");
                let event = BroadcastEvent::workflow(action, run);
                self.bus.publish(event.clone());
                emitted.push(event);
            }
        }
        emitted
    }

    /// Poll forever on a fixed `period`, starting immediately. Slow cycles
    /// push the schedule back rather than triggering catch-up bursts.
    pub async fn run(mut self, period: Duration) {
        info!(period_secs = period.as_secs(), "workflow poller started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let emitted = self.poll_once().await;
            if !emitted.is_empty() {
                info!(changes = emitted.len(), "workflow changes broadcast");
            }
        }
    }
}
