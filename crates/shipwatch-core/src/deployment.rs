use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// DeploymentId
// ---------------------------------------------------------------------------

/// Opaque deployment token. Ids minted by [`IdGenerator`] are decimal
/// millisecond timestamps, strictly increasing within the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last `n` characters (the whole id when it is shorter).
    pub fn suffix(&self, n: usize) -> &str {
        if n == 0 {
            return "";
        }
        let start = self
            .0
            .char_indices()
            .rev()
            .nth(n - 1)
            .map(|(i, _)| i)
            .unwrap_or(0);
        &self.0[start..]
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DeploymentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeploymentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Mints wall-clock derived ids that never repeat: when the clock has not
/// moved past the previous id, the previous id plus one is used instead.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> DeploymentId {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let bump = |last: u64| now.max(last + 1);
        let prev = match self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| Some(bump(last)))
        {
            Ok(v) | Err(v) => v,
        };
        DeploymentId(bump(prev).to_string())
    }
}

// ---------------------------------------------------------------------------
// DeploymentRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Started,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub id: DeploymentId,
    pub branch: String,
    pub start_time: DateTime<Utc>,
    pub status: DeploymentStatus,
}

// ---------------------------------------------------------------------------
// DeploymentRegistry
// ---------------------------------------------------------------------------

/// In-memory set of deployments that are currently running.
///
/// Cloning is cheap and every clone shares the same map. The registry never
/// broadcasts; callers announce state changes themselves.
#[derive(Debug, Clone, Default)]
pub struct DeploymentRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug, Default)]
struct RegistryInner {
    ids: IdGenerator,
    records: Mutex<HashMap<DeploymentId, DeploymentRecord>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new deployment for `branch` and return its record.
    pub fn start(&self, branch: &str) -> DeploymentRecord {
        let record = DeploymentRecord {
            id: self.inner.ids.next_id(),
            branch: branch.to_string(),
            start_time: Utc::now(),
            status: DeploymentStatus::Started,
        };
        self.records().insert(record.id.clone(), record.clone());
        debug!(id = %record.id, branch, "deployment registered");
        record
    }

    /// Drop `id` from the active set. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &DeploymentId) -> Option<DeploymentRecord> {
        let removed = self.records().remove(id);
        if removed.is_some() {
            debug!(id = %id, "deployment removed");
        }
        removed
    }

    pub fn contains(&self, id: &DeploymentId) -> bool {
        self.records().contains_key(id)
    }

    pub fn get(&self, id: &DeploymentId) -> Option<DeploymentRecord> {
        self.records().get(id).cloned()
    }

    pub fn count(&self) -> usize {
        self.records().len()
    }

    /// Hold `id` until the returned lease drops, then remove it.
    pub(crate) fn lease(&self, id: DeploymentId) -> RegistryLease {
        RegistryLease {
            registry: self.clone(),
            id,
        }
    }

    // The lock is never held across an await, so a poisoned map is still
    // consistent.
    fn records(&self) -> MutexGuard<'_, HashMap<DeploymentId, DeploymentRecord>> {
        self.inner
            .records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes its deployment from the registry exactly once, on drop.
pub(crate) struct RegistryLease {
    registry: DeploymentRegistry,
    id: DeploymentId,
}

impl Drop for RegistryLease {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
