use std::collections::{HashMap, VecDeque};

use github_actions::WorkflowRun;

/// Default number of workflow runs remembered by [`SnapshotStore`].
pub const DEFAULT_SNAPSHOT_CAPACITY: usize = 256;

/// Last observed `(status, conclusion)` of one workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSnapshot {
    pub run_id: u64,
    pub status: String,
    pub conclusion: Option<String>,
}

impl From<&WorkflowRun> for WorkflowSnapshot {
    fn from(run: &WorkflowRun) -> Self {
        Self {
            run_id: run.id,
            status: run.status.clone(),
            conclusion: run.conclusion.clone(),
        }
    }
}

/// Bounded map of run id to its last snapshot.
///
/// When full, recording a new run evicts the one observed least recently.
#[derive(Debug)]
pub struct SnapshotStore {
    capacity: usize,
    entries: HashMap<u64, WorkflowSnapshot>,
    // Front = least recently observed.
    order: VecDeque<u64>,
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, run_id: u64) -> Option<&WorkflowSnapshot> {
        self.entries.get(&run_id)
    }

    /// Store `snapshot`, returning the one it replaced.
    pub fn record(&mut self, snapshot: WorkflowSnapshot) -> Option<WorkflowSnapshot> {
        let run_id = snapshot.run_id;
        let previous = self.entries.insert(run_id, snapshot);

        if previous.is_some() {
            if let Some(pos) = self.order.iter().position(|id| *id == run_id) {
                self.order.remove(pos);
            }
        }
        self.order.push_back(run_id);

        while self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        previous
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_CAPACITY)
    }
}
