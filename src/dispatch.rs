//! Notification dispatch: the glue between transport callbacks, the progress
//! store, and the live aggregates.
//!
//! [`Dispatcher`] owns the two process-wide registries (the progress store
//! and the client-aggregate table) and is the only component allowed to
//! mutate the latter. Inbound notifications are normalized and applied to
//! the store; each pump run drains the store and feeds the resulting
//! snapshots to the matching aggregates, creating clients and tasks on first
//! sighting.
//!
//! # Drive modes
//!
//! Either let [`run`](Dispatcher::run) select over the update signal and the
//! retirement channel on a cooperative runtime, or drive the dispatcher by
//! hand with [`pump`](Dispatcher::pump) and
//! [`drain_retirements`](Dispatcher::drain_retirements) (what the tests do).
//!
//! # Error policy
//!
//! Nothing here panics or returns an error to the transport. Protocol
//! violations (vanished worker, missing token, orphaned report/end) become
//! `tracing` diagnostics and processing continues.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, Notify};

use crate::aggregate::client::{ClientAggregate, ClientRender};
use crate::config::WatchConfig;
use crate::error::{Result, WatchError};
use crate::sink::{RenderEvent, RenderSink};
use crate::store::{ApplyOutcome, ProgressStore};
use crate::types::payload::{ProgressPayload, ProgressToken};
use crate::types::snapshot::Digest;
use crate::types::worker::{WorkerDirectory, WorkerId};

/// A decay timer's request to destroy its aggregate.
///
/// Carries the epoch the timer was armed at; the dispatcher honors the
/// request only if the epoch is still current, which makes stale firings
/// harmless.
#[derive(Debug, Clone, PartialEq)]
pub enum Retirement {
    /// Retire one task aggregate.
    Task {
        /// Owning client's registry key (worker name).
        client: String,
        /// Task join key.
        token: ProgressToken,
        /// Epoch the task decay was armed at.
        epoch: u64,
    },
    /// Retire a whole client aggregate.
    Client {
        /// Client's registry key (worker name).
        client: String,
        /// Epoch the client decay was armed at.
        epoch: u64,
    },
}

/// Progress dispatch hub: ingestion, digestion, aggregate lifecycle.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use opwatch::{noop_sink, Dispatcher, StaticDirectory, WatchConfig, WorkerId};
/// use serde_json::json;
///
/// # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
/// # rt.block_on(async {
/// let directory = Arc::new(StaticDirectory::default().with_worker(1, "analyzer"));
/// let dispatcher = Dispatcher::new(WatchConfig::default(), directory, noop_sink());
///
/// dispatcher.on_notification(
///     WorkerId(1),
///     &json!({"token": "indexing", "value": {"kind": "begin", "title": "indexing"}}),
/// );
/// dispatcher.pump();
///
/// let render = dispatcher.peek("analyzer").unwrap();
/// assert!(!render.complete);
/// assert_eq!(render.body, "Started [indexing]");
/// # });
/// ```
pub struct Dispatcher {
    config: Mutex<WatchConfig>,
    enabled: AtomicBool,
    store: Mutex<ProgressStore>,
    clients: Mutex<IndexMap<String, ClientAggregate>>,
    directory: Arc<dyn WorkerDirectory>,
    sink: RenderSink,
    updates: Notify,
    stop: Notify,
    retire_tx: mpsc::UnboundedSender<Retirement>,
    retire_rx: Mutex<Option<mpsc::UnboundedReceiver<Retirement>>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given config, worker directory, and
    /// render sink.
    pub fn new(
        config: WatchConfig,
        directory: Arc<dyn WorkerDirectory>,
        sink: RenderSink,
    ) -> Self {
        let (retire_tx, retire_rx) = mpsc::unbounded_channel();
        let enabled = config.enabled;
        Self {
            config: Mutex::new(config),
            enabled: AtomicBool::new(enabled),
            store: Mutex::new(ProgressStore::new()),
            clients: Mutex::new(IndexMap::new()),
            directory,
            sink,
            updates: Notify::new(),
            stop: Notify::new(),
            retire_tx,
            retire_rx: Mutex::new(Some(retire_rx)),
        }
    }

    // ---- transport surface ----

    /// Transport callback: one raw notification of shape `{value, token}`.
    ///
    /// Best-effort log-and-drop on every failure mode; never panics, never
    /// reports an error back to the transport.
    pub fn on_notification(&self, worker_id: WorkerId, payload: &Value) {
        if !self.is_enabled() {
            tracing::trace!(worker = %worker_id, "ingestion disabled, dropping notification");
            return;
        }
        match self.ingest(worker_id, payload) {
            Ok(_) => self.signal_update(),
            Err(err) => {
                tracing::warn!(worker = %worker_id, error = %err, "dropped progress notification");
            }
        }
    }

    /// Signals that an update is available. Level-triggered: signals between
    /// pump runs coalesce.
    pub fn signal_update(&self) {
        self.updates.notify_one();
    }

    fn ingest(&self, worker_id: WorkerId, payload: &Value) -> Result<ApplyOutcome> {
        let token = payload
            .get("token")
            .and_then(ProgressToken::from_value)
            .ok_or(WatchError::MissingToken)?;

        let Some(worker) = self.directory.resolve(worker_id) else {
            return Err(WatchError::VanishedWorker { worker_id, token });
        };

        let value = payload.get("value").cloned().unwrap_or(Value::Null);
        let normalized = ProgressPayload::classify(value);
        let outcome = self.store.lock().apply(&worker, token.clone(), normalized);

        if let ApplyOutcome::Orphaned(kind) = outcome {
            let violation = WatchError::UnknownToken {
                worker: worker.name,
                token,
                kind,
            };
            tracing::warn!(error = %violation, "protocol violation, payload upserted");
        }
        Ok(outcome)
    }

    // ---- pump + retirements ----

    /// One dispatch cycle: destructive digestion, snapshot feed, client
    /// re-render, sink publish.
    pub fn pump(&self) {
        if !self.is_enabled() {
            return;
        }
        let config = self.config.lock().clone();
        let digest = self.store.lock().drain();

        let mut events = Vec::new();
        {
            let mut clients = self.clients.lock();
            for (name, snapshots) in digest {
                if snapshots.is_empty() {
                    continue;
                }
                let client = clients.entry(name.clone()).or_insert_with(|| {
                    tracing::debug!(worker = %name, "client aggregate created");
                    ClientAggregate::new(name.clone())
                });
                for snapshot in &snapshots {
                    let tx = self.retire_tx.clone();
                    let owner = name.clone();
                    let token = snapshot.token.clone();
                    client.update_task(snapshot, &config, move |epoch| {
                        let _ = tx.send(Retirement::Task {
                            client: owner,
                            token,
                            epoch,
                        });
                    });
                }
                let render = client.render(&config, self.client_decay_fn(name.clone()));
                events.push(RenderEvent::ClientChanged { name, render });
            }
        }
        for event in events {
            (self.sink)(event);
        }
    }

    /// Processes every retirement currently queued, returning how many.
    ///
    /// Returns 0 while [`run`](Self::run) owns the channel.
    pub fn drain_retirements(&self) -> usize {
        let queued = {
            let mut guard = self.retire_rx.lock();
            let Some(rx) = guard.as_mut() else { return 0 };
            let mut queued = Vec::new();
            while let Ok(retirement) = rx.try_recv() {
                queued.push(retirement);
            }
            queued
        };
        let drained = queued.len();
        for retirement in queued {
            self.process_retirement(retirement);
        }
        drained
    }

    fn process_retirement(&self, retirement: Retirement) {
        let config = self.config.lock().clone();
        let mut events = Vec::new();
        match retirement {
            Retirement::Task {
                client,
                token,
                epoch,
            } => {
                let mut clients = self.clients.lock();
                if let Some(aggregate) = clients.get_mut(&client) {
                    if aggregate.retire_task(&token, epoch) {
                        tracing::debug!(worker = %client, %token, "task aggregate retired");
                        let render =
                            aggregate.render(&config, self.client_decay_fn(client.clone()));
                        events.push(RenderEvent::ClientChanged {
                            name: client,
                            render,
                        });
                    } else {
                        tracing::trace!(worker = %client, %token, "stale task retirement ignored");
                    }
                }
            }
            Retirement::Client { client, epoch } => {
                let mut clients = self.clients.lock();
                let current = clients
                    .get(&client)
                    .is_some_and(|agg| agg.is_complete() && agg.decay_epoch() == epoch);
                if current {
                    if let Some(mut aggregate) = clients.shift_remove(&client) {
                        aggregate.destroy();
                    }
                    tracing::debug!(worker = %client, "client aggregate retired");
                    events.push(RenderEvent::ClientRemoved { name: client });
                } else {
                    tracing::trace!(worker = %client, "stale client retirement ignored");
                }
            }
        }
        for event in events {
            (self.sink)(event);
        }
    }

    fn client_decay_fn(&self, client: String) -> impl FnOnce(u64) + Send + 'static {
        let tx = self.retire_tx.clone();
        move |epoch| {
            let _ = tx.send(Retirement::Client { client, epoch });
        }
    }

    /// Select-loop over the update signal and the retirement channel until
    /// [`stop`](Self::stop) is called. Intended for a current-thread runtime.
    pub async fn run(&self) {
        let Some(mut rx) = self.retire_rx.lock().take() else {
            tracing::warn!("dispatcher is already running");
            return;
        };
        loop {
            tokio::select! {
                _ = self.updates.notified() => self.pump(),
                retirement = rx.recv() => match retirement {
                    Some(r) => self.process_retirement(r),
                    None => break,
                },
                _ = self.stop.notified() => break,
            }
        }
        *self.retire_rx.lock() = Some(rx);
    }

    /// Requests that [`run`](Self::run) return.
    pub fn stop(&self) {
        self.stop.notify_one();
    }

    // ---- host surface ----

    /// Read-only digestion query surface.
    pub fn digest(&self) -> Digest {
        self.store.lock().digest()
    }

    /// Current render output for one client, without touching any timer.
    pub fn peek(&self, name: &str) -> Option<ClientRender> {
        let config = self.config.lock().clone();
        self.clients
            .lock()
            .get(name)
            .map(|client| client.peek_render(&config))
    }

    /// Names of all live client aggregates, in creation order.
    pub fn client_names(&self) -> Vec<String> {
        self.clients.lock().keys().cloned().collect()
    }

    /// Returns `true` iff no unfinished entry exists and every live client
    /// renders complete.
    pub fn is_idle(&self) -> bool {
        !self.store.lock().has_unfinished()
            && self.clients.lock().values().all(ClientAggregate::is_complete)
    }

    /// Purges all progress state for a worker that shut down, destroying its
    /// client aggregate immediately.
    pub fn remove_worker(&self, worker_id: WorkerId) {
        let name = self.store.lock().remove_worker(worker_id);
        let Some(name) = name else {
            tracing::debug!(worker = %worker_id, "remove for unknown worker ignored");
            return;
        };
        let removed = {
            let mut clients = self.clients.lock();
            clients.shift_remove(&name).map(|mut aggregate| {
                aggregate.destroy();
            })
        };
        tracing::debug!(worker = %worker_id, name = %name, "worker removed");
        if removed.is_some() {
            (self.sink)(RenderEvent::ClientRemoved { name });
        }
    }

    /// Drops all progress state and live aggregates (host-initiated
    /// dismiss-all).
    pub fn clear(&self) {
        self.store.lock().clear();
        let names: Vec<String> = {
            let mut clients = self.clients.lock();
            clients
                .drain(..)
                .map(|(name, mut aggregate)| {
                    aggregate.destroy();
                    name
                })
                .collect()
        };
        for name in names {
            (self.sink)(RenderEvent::ClientRemoved { name });
        }
    }

    /// Toggles ingestion at runtime. Disabling freezes existing state; it
    /// does not clear it.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Whether ingestion currently runs.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Snapshot of the active configuration.
    pub fn config(&self) -> WatchConfig {
        self.config.lock().clone()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("enabled", &self.is_enabled())
            .field("clients", &self.client_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::noop_sink;
    use crate::types::worker::StaticDirectory;
    use serde_json::json;

    fn dispatcher() -> Dispatcher {
        let directory = Arc::new(StaticDirectory::default().with_worker(1, "analyzer"));
        Dispatcher::new(WatchConfig::default(), directory, noop_sink())
    }

    #[tokio::test]
    async fn notification_reaches_store_and_pump_builds_client() {
        let d = dispatcher();
        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin", "title": "index"}}),
        );
        assert_eq!(d.digest()["analyzer"].len(), 1);

        d.pump();
        assert_eq!(d.client_names(), ["analyzer"]);
        assert!(!d.peek("analyzer").unwrap().complete);
    }

    #[tokio::test]
    async fn missing_token_is_dropped_without_store_write() {
        let d = dispatcher();
        d.on_notification(WorkerId(1), &json!({"value": {"kind": "begin"}}));
        d.on_notification(WorkerId(1), &json!({"token": 1.5, "value": {"kind": "begin"}}));
        assert!(d.digest().is_empty());
    }

    #[tokio::test]
    async fn vanished_worker_leaves_store_unmodified() {
        let d = dispatcher();
        d.on_notification(
            WorkerId(99),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        assert!(d.digest().is_empty());
    }

    #[tokio::test]
    async fn disabled_dispatcher_ignores_everything() {
        let d = dispatcher();
        d.set_enabled(false);
        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        d.pump();
        assert!(d.digest().is_empty());
        assert!(d.client_names().is_empty());

        d.set_enabled(true);
        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        assert_eq!(d.digest()["analyzer"].len(), 1);
    }

    #[tokio::test]
    async fn config_enabled_false_starts_disabled() {
        let directory = Arc::new(StaticDirectory::default().with_worker(1, "analyzer"));
        let d = Dispatcher::new(
            WatchConfig::default().with_enabled(false),
            directory,
            noop_sink(),
        );
        assert!(!d.is_enabled());
    }

    #[tokio::test]
    async fn remove_worker_purges_store_and_client() {
        let d = dispatcher();
        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        d.pump();
        assert_eq!(d.client_names(), ["analyzer"]);

        d.remove_worker(WorkerId(1));
        assert!(d.client_names().is_empty());
        assert!(d.digest().is_empty());
    }

    #[tokio::test]
    async fn clear_drops_all_state() {
        let d = dispatcher();
        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        d.pump();
        d.clear();
        assert!(d.client_names().is_empty());
        assert!(d.digest().is_empty());
        assert!(d.is_idle());
    }

    #[tokio::test]
    async fn is_idle_tracks_unfinished_work() {
        let d = dispatcher();
        assert!(d.is_idle());

        d.on_notification(
            WorkerId(1),
            &json!({"token": "t", "value": {"kind": "begin"}}),
        );
        assert!(!d.is_idle());

        d.pump();
        assert!(!d.is_idle());

        d.on_notification(WorkerId(1), &json!({"token": "t", "value": {"kind": "end"}}));
        d.pump();
        assert!(d.is_idle());
    }
}
