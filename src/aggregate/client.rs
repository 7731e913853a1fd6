//! Per-worker composition of task aggregates.
//!
//! A [`ClientAggregate`] owns the ordered set of task aggregates for one
//! worker, joins their render output into a single body, and owns its own
//! decay timer: once every inbound task reports complete, the whole client
//! retires after `client_decay`.

use indexmap::IndexMap;

use crate::aggregate::task::TaskAggregate;
use crate::config::WatchConfig;
use crate::timer::DecayTimer;
use crate::types::payload::ProgressToken;
use crate::types::snapshot::TaskSnapshot;

/// Render output of one client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRender {
    /// Worker name.
    pub title: String,
    /// Logical AND over all inbound tasks' completeness; vacuously `true`
    /// with zero tasks.
    pub complete: bool,
    /// Newline-joined task messages in inbound order.
    pub body: String,
}

/// Live render state for one worker.
#[derive(Debug)]
pub struct ClientAggregate {
    name: String,
    tasks: IndexMap<ProgressToken, TaskAggregate>,
    decay: DecayTimer,
}

impl ClientAggregate {
    /// Creates a client with no tasks yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tasks: IndexMap::new(),
            decay: DecayTimer::new(),
        }
    }

    /// Worker name this client renders for.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Routes one snapshot to its task aggregate, creating the aggregate on
    /// first sighting of the token.
    ///
    /// A new task arriving while a client-level decay is pending implicitly
    /// resets that decay at the next [`render`](Self::render).
    pub fn update_task<F>(&mut self, snapshot: &TaskSnapshot, config: &WatchConfig, on_decay: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.tasks
            .entry(snapshot.token.clone())
            .or_default()
            .update(snapshot, config, on_decay);
    }

    /// Composes the current render output and manages the client decay.
    ///
    /// When the composed output is complete, any existing decay is canceled
    /// and a fresh one armed for `config.client_decay`; when incomplete, a
    /// pending decay is canceled and not re-armed.
    pub fn render<F>(&mut self, config: &WatchConfig, on_decay: F) -> ClientRender
    where
        F: FnOnce(u64) + Send + 'static,
    {
        let render = self.peek_render(config);
        if render.complete {
            self.decay.arm(config.client_decay, on_decay);
        } else {
            self.decay.cancel();
        }
        render
    }

    /// Composes the render output without touching any timer.
    pub fn peek_render(&self, config: &WatchConfig) -> ClientRender {
        let complete = self.tasks.values().all(TaskAggregate::is_complete);
        let body = self
            .tasks
            .values()
            .map(|task| task.render(config).message)
            .collect::<Vec<_>>()
            .join("\n");
        ClientRender {
            title: self.name.clone(),
            complete,
            body,
        }
    }

    /// Retires the task for `token` if it is still complete and `epoch`
    /// matches its decay timer. Returns whether a task was removed.
    ///
    /// A stale epoch (the task was updated or re-armed since the firing) or
    /// an unknown token is a no-op, which makes retirement idempotent.
    pub fn retire_task(&mut self, token: &ProgressToken, epoch: u64) -> bool {
        let Some(task) = self.tasks.get(token) else {
            return false;
        };
        if !task.is_complete() || task.decay_epoch() != epoch {
            return false;
        }
        if let Some(mut task) = self.tasks.shift_remove(token) {
            task.destroy();
        }
        true
    }

    /// Returns `true` iff every inbound task reports complete (vacuously
    /// `true` with zero tasks).
    pub fn is_complete(&self) -> bool {
        self.tasks.values().all(TaskAggregate::is_complete)
    }

    /// Number of live task aggregates.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Returns `true` with zero live task aggregates.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Epoch a client decay firing must carry to still be current.
    pub fn decay_epoch(&self) -> u64 {
        self.decay.epoch()
    }

    /// Returns `true` while a client decay firing is pending.
    pub fn decay_armed(&self) -> bool {
        self.decay.is_armed()
    }

    /// Destroys the client and all of its tasks. Idempotent.
    pub fn destroy(&mut self) {
        self.decay.cancel();
        for task in self.tasks.values_mut() {
            task.destroy();
        }
        self.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn snap(token: &str, message: &str, done: bool) -> TaskSnapshot {
        TaskSnapshot {
            name: "w".to_string(),
            token: token.into(),
            title: None,
            message: Some(message.to_string()),
            percentage: None,
            done,
            progress: true,
        }
    }

    fn config() -> WatchConfig {
        WatchConfig::default()
    }

    #[tokio::test]
    async fn empty_client_is_vacuously_complete() {
        let client = ClientAggregate::new("analyzer");
        let render = client.peek_render(&config());
        assert!(render.complete);
        assert_eq!(render.title, "analyzer");
        assert_eq!(render.body, "");
    }

    #[tokio::test]
    async fn body_joins_tasks_in_inbound_order() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(&snap("b", "second", false), &config(), |_| {});
        client.update_task(&snap("a", "first", false), &config(), |_| {});

        let render = client.peek_render(&config());
        assert_eq!(render.body, "second\nfirst");
        assert!(!render.complete);
    }

    #[tokio::test]
    async fn completeness_is_and_over_tasks() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(&snap("a", "x", true), &config(), |_| {});
        client.update_task(&snap("b", "y", false), &config(), |_| {});
        assert!(!client.is_complete());

        client.update_task(&snap("b", "y", true), &config(), |_| {});
        assert!(client.is_complete());
    }

    #[tokio::test(start_paused = true)]
    async fn render_arms_decay_only_when_complete() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(&snap("a", "x", false), &config(), |_| {});
        client.render(&config(), |_| {});
        assert!(!client.decay_armed());

        client.update_task(&snap("a", "x", true), &config(), |_| {});
        client.render(&config(), |_| {});
        assert!(client.decay_armed());

        // Back to incomplete: pending decay is canceled, not re-armed.
        client.update_task(&snap("b", "new", false), &config(), |_| {});
        client.render(&config(), |_| {});
        assert!(!client.decay_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rerender_while_complete_rearms_fresh_decay() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(&snap("a", "x", true), &config(), |_| {});

        client.render(&config(), |_| {});
        let first_epoch = client.decay_epoch();
        client.render(&config(), |_| {});
        assert!(client.decay_epoch() > first_epoch);
        assert!(client.decay_armed());
    }

    #[tokio::test]
    async fn retire_task_checks_completeness_and_epoch() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(
            &snap("a", "x", true),
            &config().with_task_decay(Duration::from_secs(60)),
            |_| {},
        );
        let token = ProgressToken::from("a");
        // The armed epoch is what a real firing would carry.
        let epoch = client.tasks.get(&token).unwrap().decay_epoch();

        assert!(!client.retire_task(&"a".into(), epoch + 1), "stale epoch");
        assert!(!client.retire_task(&"missing".into(), epoch));
        assert!(client.retire_task(&"a".into(), epoch));
        assert!(client.is_empty());

        // Second retirement of the same slot is a no-op.
        assert!(!client.retire_task(&"a".into(), epoch));
    }

    #[tokio::test]
    async fn destroy_clears_all_tasks() {
        let mut client = ClientAggregate::new("analyzer");
        client.update_task(&snap("a", "x", false), &config(), |_| {});
        client.update_task(&snap("b", "y", true), &config(), |_| {});

        client.destroy();
        assert!(client.is_empty());
        assert!(!client.decay_armed());
    }
}
