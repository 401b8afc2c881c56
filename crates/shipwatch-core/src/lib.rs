pub mod bus;
pub mod deployment;
pub mod error;
pub mod event;
pub mod poller;
pub mod sequence;
pub mod sequencer;
pub mod snapshot;

pub use bus::EventBus;
pub use deployment::{DeploymentId, DeploymentRecord, DeploymentRegistry, DeploymentStatus};
pub use error::StepError;
pub use event::{BroadcastEvent, LogKind, WorkflowSummary};
pub use poller::{ChangeDetector, WorkflowSource, DEFAULT_POLL_INTERVAL};
pub use sequence::{DeploymentRun, RunState, Step, STEPS};
pub use sequencer::{Sequencer, SimulatedSteps, StepExecutor};
pub use snapshot::{SnapshotStore, WorkflowSnapshot, DEFAULT_SNAPSHOT_CAPACITY};
