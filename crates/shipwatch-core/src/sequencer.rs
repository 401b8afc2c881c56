use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt as _;
use tracing::{error, info, warn};

use crate::bus::EventBus;
use crate::deployment::{DeploymentId, DeploymentRecord, DeploymentRegistry};
use crate::error::StepError;
use crate::event::BroadcastEvent;
use crate::sequence::{DeploymentRun, RunState, Step};

// ---------------------------------------------------------------------------
// StepExecutor
// ---------------------------------------------------------------------------

/// Performs one pipeline step. The returned future is the only place a run
/// suspends.
pub trait StepExecutor: Send + Sync + 'static {
    fn execute(&self, id: &DeploymentId, step: &'static Step)
        -> BoxFuture<'static, Result<(), StepError>>;
}

/// Waits out each step's nominal duration on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedSteps;

impl StepExecutor for SimulatedSteps {
    fn execute(
        &self,
        _id: &DeploymentId,
        step: &'static Step,
    ) -> BoxFuture<'static, Result<(), StepError>> {
        Box::pin(async move {
            tokio::time::sleep(step.duration).await;
            Ok(())
        })
    }
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Drives [`DeploymentRun`] state machines and publishes what they emit.
#[derive(Clone)]
pub struct Sequencer {
    registry: DeploymentRegistry,
    bus: EventBus,
    executor: Arc<dyn StepExecutor>,
}

impl Sequencer {
    pub fn new(registry: DeploymentRegistry, bus: EventBus) -> Self {
        Self {
            registry,
            bus,
            executor: Arc::new(SimulatedSteps),
        }
    }

    pub fn with_executor(mut self, executor: Arc<dyn StepExecutor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    /// Register a deployment for `branch`, announce it, and run it in the
    /// background. Must be called from within a tokio runtime.
    pub fn launch(&self, branch: &str) -> DeploymentRecord {
        let record = self.registry.start(branch);
        info!(id = %record.id, branch, "deployment started");
        self.bus.publish(BroadcastEvent::started(
            Some(record.id.clone()),
            Some(record.branch.clone()),
        ));

        let sequencer = self.clone();
        let id = record.id.clone();
        tokio::spawn(async move {
            sequencer.run(id).await;
        });
        record
    }

    /// Walk every step for `id`, then drop it from the registry whatever the
    /// outcome. Returns `None` when `id` is not an active deployment.
    pub async fn run(&self, id: DeploymentId) -> Option<RunState> {
        if !self.registry.contains(&id) {
            warn!(id = %id, "refusing to sequence an unregistered deployment");
            return None;
        }
        let _lease = self.registry.lease(id.clone());

        let mut run = DeploymentRun::new(id.clone());
        self.emit(run.start());

        while let Some(step) = run.current_step() {
            let outcome = AssertUnwindSafe(self.executor.execute(&id, step))
                .catch_unwind()
                .await;
            let events = match outcome {
                Ok(Ok(())) => run.finish_step(),
                Ok(Err(e)) => {
                    warn!(id = %id, step = step.name, error = %e, "deployment step failed");
                    run.fail(e.to_string())
                }
                Err(_) => {
                    error!(id = %id, step = step.name, "deployment step panicked");
                    run.fail(
                        StepError::Panicked {
                            step: step.name.to_string(),
                        }
                        .to_string(),
                    )
                }
            };
            self.emit(events);
        }

        match run.state() {
            RunState::Completed { url } => info!(id = %id, url = %url, "deployment completed"),
            RunState::Failed { error } => warn!(id = %id, error = %error, "deployment failed"),
            _ => {}
        }
        Some(run.state().clone())
    }

    fn emit(&self, events: Vec<BroadcastEvent>) {
        for event in events {
            self.bus.publish(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::STEPS;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::broadcast;

    /// Finishes every step immediately, recording what it was asked to wait.
    #[derive(Default)]
    struct InstantSteps {
        waited: Mutex<Vec<Duration>>,
    }

    impl StepExecutor for InstantSteps {
        fn execute(
            &self,
            _id: &DeploymentId,
            step: &'static Step,
        ) -> BoxFuture<'static, Result<(), StepError>> {
            self.waited.lock().unwrap().push(step.duration);
            Box::pin(async { Ok(()) })
        }
    }

    /// Fails (or panics) when it reaches the named step.
    struct BreakAt {
        step: &'static str,
        panic: bool,
    }

    impl StepExecutor for BreakAt {
        fn execute(
            &self,
            _id: &DeploymentId,
            step: &'static Step,
        ) -> BoxFuture<'static, Result<(), StepError>> {
            let hit = step.name == self.step;
            let panic = self.panic;
            Box::pin(async move {
                if hit && panic {
                    panic!("simulated crash");
                }
                if hit {
                    return Err(StepError::failed(step.name, "disk full"));
                }
                Ok(())
            })
        }
    }

    fn drain(rx: &mut broadcast::Receiver<BroadcastEvent>) -> Vec<BroadcastEvent> {
        let mut out = Vec::new();
        while let Ok(event) = rx.try_recv() {
            out.push(event);
        }
        out
    }

    fn setup(executor: Arc<dyn StepExecutor>) -> (Sequencer, broadcast::Receiver<BroadcastEvent>) {
        let bus = EventBus::default();
        let rx = bus.subscribe();
        let sequencer = Sequencer::new(DeploymentRegistry::new(), bus).with_executor(executor);
        (sequencer, rx)
    }

    #[tokio::test]
    async fn successful_run_emits_in_order_and_cleans_up() {
        let executor = Arc::new(InstantSteps::default());
        let (sequencer, mut rx) = setup(executor.clone());
        let record = sequencer.registry().start("main");

        let state = sequencer.run(record.id.clone()).await;
        let url = format!("https://ci-cd-{}.vercel.app", record.id.suffix(6));
        assert_eq!(state, Some(RunState::Completed { url: url.clone() }));
        assert!(!sequencer.registry().contains(&record.id));

        let events = drain(&mut rx);
        let progress = events.iter().filter(|e| e.name() == "deployment:progress").count();
        let logs = events.iter().filter(|e| e.name() == "deployment:log").count();
        assert_eq!((progress, logs, events.len()), (6, 6, 13));
        match events.last() {
            Some(BroadcastEvent::DeploymentCompleted(c)) => assert_eq!(c.url, url),
            other => panic!("expected completed last, got {other:?}"),
        }

        let waited = executor.waited.lock().unwrap().clone();
        let expected: Vec<_> = STEPS.iter().map(|s| s.duration).collect();
        assert_eq!(waited, expected);
    }

    #[tokio::test]
    async fn failing_step_emits_single_failed_and_cleans_up() {
        let (sequencer, mut rx) = setup(Arc::new(BreakAt {
            step: "Running tests",
            panic: false,
        }));
        let record = sequencer.registry().start("main");

        let state = sequencer.run(record.id.clone()).await;
        assert!(matches!(state, Some(RunState::Failed { .. })));
        assert_eq!(sequencer.registry().count(), 0);

        let events = drain(&mut rx);
        let terminal: Vec<_> = events.iter().filter(|e| e.is_terminal()).collect();
        assert_eq!(terminal.len(), 1);
        match terminal[0] {
            BroadcastEvent::DeploymentFailed(f) => {
                assert_eq!(f.error, "Running tests failed: disk full");
                assert_eq!(f.id.as_ref(), Some(&record.id));
            }
            other => panic!("expected failed, got {other:?}"),
        }
        // Two steps completed before the third broke.
        assert_eq!(
            events.iter().filter(|e| e.name() == "deployment:log").count(),
            2
        );
        assert!(events.last().is_some_and(|e| e.is_terminal()));
    }

    #[tokio::test]
    async fn panicking_step_is_reported_as_failure() {
        let (sequencer, mut rx) = setup(Arc::new(BreakAt {
            step: "Checking out code",
            panic: true,
        }));
        let record = sequencer.registry().start("main");

        let state = sequencer.run(record.id.clone()).await;
        assert_eq!(
            state,
            Some(RunState::Failed {
                error: "Checking out code panicked".into()
            })
        );
        assert!(!sequencer.registry().contains(&record.id));
        let events = drain(&mut rx);
        assert_eq!(
            events.iter().map(|e| e.name()).collect::<Vec<_>>(),
            vec!["deployment:progress", "deployment:failed"]
        );
    }

    #[tokio::test]
    async fn unregistered_id_emits_nothing() {
        let (sequencer, mut rx) = setup(Arc::new(InstantSteps::default()));
        assert_eq!(sequencer.run("ghost".into()).await, None);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn launch_announces_and_runs_in_background() {
        let (sequencer, mut rx) = setup(Arc::new(InstantSteps::default()));
        let record = sequencer.launch("release");

        let first = rx.recv().await.unwrap();
        match first {
            BroadcastEvent::DeploymentStarted(s) => {
                assert_eq!(s.id.as_ref(), Some(&record.id));
                assert_eq!(s.branch.as_deref(), Some("release"));
            }
            other => panic!("expected started, got {other:?}"),
        }

        loop {
            let event = rx.recv().await.unwrap();
            if event.is_terminal() {
                assert_eq!(event.name(), "deployment:completed");
                break;
            }
        }
        // The lease is released right after the terminal event.
        tokio::task::yield_now().await;
        for _ in 0..100 {
            if sequencer.registry().count() == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sequencer.registry().count(), 0);
    }

    /// `actual` landed on `expected` give or take timer granularity.
    fn near(actual: Duration, expected: Duration) -> bool {
        actual >= expected && actual - expected < Duration::from_millis(50)
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_steps_follow_the_step_table_clock() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let sequencer = Sequencer::new(DeploymentRegistry::new(), bus);
        let record = sequencer.registry().start("main");

        let started = tokio::time::Instant::now();
        let handle = tokio::spawn({
            let sequencer = sequencer.clone();
            let id = record.id.clone();
            async move { sequencer.run(id).await }
        });

        let mut step_starts = Vec::new();
        let mut logs = 0;
        let finished = loop {
            let event = rx.recv().await.unwrap();
            let at = started.elapsed();
            match event {
                BroadcastEvent::DeploymentProgress(_) => step_starts.push(at),
                BroadcastEvent::DeploymentLog(_) => logs += 1,
                BroadcastEvent::DeploymentCompleted(_) => break at,
                other => panic!("unexpected {other:?}"),
            }
        };

        let expected_starts = [0, 2, 7, 10, 14, 20].map(Duration::from_secs);
        assert_eq!(step_starts.len(), 6);
        assert_eq!(logs, 6);
        for (actual, expected) in step_starts.iter().zip(expected_starts) {
            assert!(near(*actual, expected), "step began at {actual:?}, expected {expected:?}");
        }
        assert!(near(finished, Duration::from_secs(22)), "completed at {finished:?}");

        let state = handle.await.unwrap();
        assert!(matches!(state, Some(RunState::Completed { .. })));
        assert_eq!(sequencer.registry().count(), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_keep_their_own_order() {
        let (sequencer, mut rx) = setup(Arc::new(InstantSteps::default()));
        let a = sequencer.registry().start("a");
        let b = sequencer.registry().start("b");

        let (ra, rb) = tokio::join!(sequencer.run(a.id.clone()), sequencer.run(b.id.clone()));
        assert!(matches!(ra, Some(RunState::Completed { .. })));
        assert!(matches!(rb, Some(RunState::Completed { .. })));
        assert_eq!(sequencer.registry().count(), 0);

        let events = drain(&mut rx);
        for id in [&a.id, &b.id] {
            let progress: Vec<u8> = events
                .iter()
                .filter(|e| e.deployment_id() == Some(id))
                .filter_map(|e| match e {
                    BroadcastEvent::DeploymentProgress(p) => Some(p.progress),
                    _ => None,
                })
                .collect();
            assert_eq!(progress, vec![10, 30, 50, 70, 90, 100]);
        }
    }
}
