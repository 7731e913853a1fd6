//! Worker identity and the lookup collaborator.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of an external worker (e.g. a language-analysis backend).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub u32);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for WorkerId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Resolved worker identity: stable id plus human-readable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInfo {
    /// Stable worker id.
    pub id: WorkerId,
    /// Human-readable worker name, used as the registry key for display.
    pub name: String,
}

impl WorkerInfo {
    /// Creates a worker identity.
    pub fn new(id: impl Into<WorkerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Lookup collaborator mapping worker ids to live identities.
///
/// Workers may disappear (shut down) at any time; `resolve` returning `None`
/// is an expected condition the pipeline handles with a diagnostic, never a
/// panic.
pub trait WorkerDirectory: Send + Sync {
    /// Resolves a worker id, or `None` if the worker is already gone.
    fn resolve(&self, id: WorkerId) -> Option<WorkerInfo>;
}

/// Fixed in-memory directory, mainly useful for tests and embedding hosts
/// that know their worker set up front.
///
/// # Examples
///
/// ```
/// use opwatch::{StaticDirectory, WorkerDirectory, WorkerId};
///
/// let dir = StaticDirectory::default().with_worker(1, "analyzer");
/// assert_eq!(dir.resolve(WorkerId(1)).unwrap().name, "analyzer");
/// assert!(dir.resolve(WorkerId(2)).is_none());
/// ```
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    workers: HashMap<WorkerId, String>,
}

impl StaticDirectory {
    /// Adds a worker to the directory.
    pub fn with_worker(mut self, id: impl Into<WorkerId>, name: impl Into<String>) -> Self {
        self.workers.insert(id.into(), name.into());
        self
    }

    /// Removes a worker, simulating a shutdown.
    pub fn remove(&mut self, id: WorkerId) {
        self.workers.remove(&id);
    }
}

impl WorkerDirectory for StaticDirectory {
    fn resolve(&self, id: WorkerId) -> Option<WorkerInfo> {
        self.workers
            .get(&id)
            .map(|name| WorkerInfo::new(id, name.clone()))
    }
}
