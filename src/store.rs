//! The process-wide progress table and its digestion pass.
//!
//! [`ProgressStore`] holds the latest known state of every in-flight
//! operation, keyed by `(worker, token)`. It has exactly one writer: the
//! normalizer path calls [`apply`](ProgressStore::apply), and the digestion
//! pass prunes finished entries through [`drain`](ProgressStore::drain).
//! Nothing else mutates it.
//!
//! # Ordering
//!
//! Both the worker table and each worker's entry table are insertion-ordered
//! (`IndexMap`), so digestion emits snapshots in first-sighting order and the
//! output is stable across read-only runs.
//!
//! # Merge semantics
//!
//! - `begin` creates or overwrites the entry for its token.
//! - `report` merges `message`/`percentage` into the existing entry; with no
//!   existing entry it upserts from what it carried and reports
//!   [`ApplyOutcome::Orphaned`] so the caller can log the protocol violation.
//! - `end` merges `message`, sets `done`, and orphan-upserts the same way.
//! - A payload without a `kind` discriminator is stored as an already-done
//!   one-shot entry.

use indexmap::IndexMap;
use serde_json::Value;

use crate::types::payload::{ProgressKind, ProgressPayload, ProgressToken};
use crate::types::snapshot::{Digest, TaskSnapshot};
use crate::types::worker::{WorkerId, WorkerInfo};

/// Latest known state of one in-flight operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProgressEntry {
    /// Operation title.
    pub title: Option<String>,
    /// Latest human-readable message.
    pub message: Option<String>,
    /// Latest percentage in `[0, 100]`.
    pub percentage: Option<f64>,
    /// Whether the operation has finished.
    pub done: bool,
    /// Shape of the notification that last wrote this entry.
    pub kind: ProgressKind,
}

/// How [`ProgressStore::apply`] disposed of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// A fresh entry was created (`begin` or one-shot payload).
    Created,
    /// An existing entry was merged in place.
    Merged,
    /// A `report`/`end` referenced a token with no live entry; the payload
    /// was upserted anyway so its data is not lost. The carried kind tells
    /// the caller what to log.
    Orphaned(ProgressKind),
}

#[derive(Debug, Default)]
struct WorkerProgress {
    name: String,
    entries: IndexMap<ProgressToken, ProgressEntry>,
}

/// Insertion-ordered progress table, one row per `(worker, token)`.
///
/// # Examples
///
/// ```
/// use opwatch::{ProgressPayload, ProgressStore, WorkerInfo};
/// use serde_json::json;
///
/// let mut store = ProgressStore::new();
/// let worker = WorkerInfo::new(1, "analyzer");
/// store.apply(
///     &worker,
///     "indexing".into(),
///     ProgressPayload::classify(json!({"kind": "begin", "title": "indexing"})),
/// );
///
/// let digest = store.digest();
/// assert_eq!(digest["analyzer"].len(), 1);
/// assert_eq!(digest["analyzer"][0].title.as_deref(), Some("indexing"));
/// assert!(!digest["analyzer"][0].done);
/// ```
#[derive(Debug, Default)]
pub struct ProgressStore {
    workers: IndexMap<WorkerId, WorkerProgress>,
}

impl ProgressStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one normalized payload to the entry for `(worker, token)`.
    ///
    /// This is the single write path into the table. It never fails; the
    /// returned [`ApplyOutcome`] carries what happened so the caller can emit
    /// diagnostics for protocol violations.
    pub fn apply(
        &mut self,
        worker: &WorkerInfo,
        token: ProgressToken,
        payload: ProgressPayload,
    ) -> ApplyOutcome {
        let row = self.workers.entry(worker.id).or_default();
        row.name = worker.name.clone();

        match payload {
            ProgressPayload::Begin(begin) => {
                row.entries.insert(
                    token,
                    ProgressEntry {
                        title: begin.title,
                        message: begin.message,
                        percentage: begin.percentage,
                        done: false,
                        kind: ProgressKind::Begin,
                    },
                );
                ApplyOutcome::Created
            }
            ProgressPayload::Report(report) => match row.entries.get_mut(&token) {
                Some(entry) => {
                    if report.message.is_some() {
                        entry.message = report.message;
                    }
                    if report.percentage.is_some() {
                        entry.percentage = report.percentage;
                    }
                    entry.kind = ProgressKind::Report;
                    ApplyOutcome::Merged
                }
                None => {
                    row.entries.insert(
                        token,
                        ProgressEntry {
                            title: None,
                            message: report.message,
                            percentage: report.percentage,
                            done: false,
                            kind: ProgressKind::Report,
                        },
                    );
                    ApplyOutcome::Orphaned(ProgressKind::Report)
                }
            },
            ProgressPayload::End(end) => match row.entries.get_mut(&token) {
                Some(entry) => {
                    if end.message.is_some() {
                        entry.message = end.message;
                    }
                    entry.done = true;
                    entry.kind = ProgressKind::End;
                    ApplyOutcome::Merged
                }
                None => {
                    row.entries.insert(
                        token,
                        ProgressEntry {
                            title: None,
                            message: end.message,
                            percentage: None,
                            done: true,
                            kind: ProgressKind::End,
                        },
                    );
                    ApplyOutcome::Orphaned(ProgressKind::End)
                }
            },
            ProgressPayload::Opaque(value) => {
                row.entries.insert(token, one_shot_entry(&value));
                ApplyOutcome::Created
            }
        }
    }

    /// Read-only digestion: per-worker snapshot sequences in insertion order.
    ///
    /// Leaves the store untouched; calling it any number of times yields
    /// identical output. Workers with zero live entries still contribute an
    /// empty sequence.
    pub fn digest(&self) -> Digest {
        let mut digest = Digest::new();
        for row in self.workers.values() {
            let out: &mut Vec<TaskSnapshot> = digest.entry(row.name.clone()).or_default();
            for (token, entry) in &row.entries {
                out.push(snapshot(&row.name, token, entry));
            }
        }
        digest
    }

    /// Destructive digestion: same output as [`digest`](Self::digest), then
    /// removes every entry that was `done` at call time.
    ///
    /// Removals are collected during enumeration and applied after it, so the
    /// entry tables are never mutated while being iterated.
    pub fn drain(&mut self) -> Digest {
        let digest = self.digest();

        let mut finished: Vec<(WorkerId, ProgressToken)> = Vec::new();
        for (id, row) in &self.workers {
            for (token, entry) in &row.entries {
                if entry.done {
                    finished.push((*id, token.clone()));
                }
            }
        }
        for (id, token) in finished {
            if let Some(row) = self.workers.get_mut(&id) {
                row.entries.shift_remove(&token);
            }
        }

        digest
    }

    /// Looks up the current entry for `(worker, token)`.
    pub fn entry(&self, worker: WorkerId, token: &ProgressToken) -> Option<&ProgressEntry> {
        self.workers.get(&worker)?.entries.get(token)
    }

    /// Removes every entry belonging to `worker` along with its row,
    /// returning the worker's name if it was known.
    pub fn remove_worker(&mut self, worker: WorkerId) -> Option<String> {
        self.workers.shift_remove(&worker).map(|row| row.name)
    }

    /// Drops all state.
    pub fn clear(&mut self) {
        self.workers.clear();
    }

    /// Total number of live entries across all workers.
    pub fn len(&self) -> usize {
        self.workers.values().map(|row| row.entries.len()).sum()
    }

    /// Returns `true` if no worker holds any live entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if any live entry is not yet done.
    pub fn has_unfinished(&self) -> bool {
        self.workers
            .values()
            .any(|row| row.entries.values().any(|entry| !entry.done))
    }
}

/// Builds an already-terminal entry from a payload that carried no `kind`.
///
/// Title/message/percentage are taken from same-named fields when present;
/// a wrapped bare scalar (`{"content": ...}`) becomes the message.
fn one_shot_entry(value: &Value) -> ProgressEntry {
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| value.get("content").map(render_content));

    ProgressEntry {
        title: value
            .get("title")
            .and_then(Value::as_str)
            .map(str::to_string),
        message,
        percentage: value
            .get("percentage")
            .and_then(Value::as_f64)
            .map(|p| p.clamp(0.0, 100.0)),
        done: true,
        kind: ProgressKind::Unspecified,
    }
}

fn render_content(content: &Value) -> String {
    match content {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn snapshot(name: &str, token: &ProgressToken, entry: &ProgressEntry) -> TaskSnapshot {
    TaskSnapshot {
        name: name.to_string(),
        token: token.clone(),
        title: entry.title.clone(),
        message: entry.message.clone(),
        percentage: entry.percentage,
        done: entry.done,
        progress: true,
    }
}
