//! Per-task render state machine.
//!
//! One [`TaskAggregate`] exists per logical unit of work under a client. It
//! consumes digested snapshots, keeps the latest render fields, and owns the
//! decay timer that retires it after completion.
//!
//! # State machine
//!
//! ```text
//! Active -> Complete      (snapshot with done = true)
//! Complete -> Active      (fresh snapshot for the same slot, e.g. a reused token)
//! Complete -> Destroyed   (decay timer fires and its epoch is still current)
//! Destroyed -> (terminal)
//! ```
//!
//! No operation here returns an error: malformed snapshots degrade to the
//! configured defaults.

use std::time::Duration;

use crate::config::WatchConfig;
use crate::timer::DecayTimer;
use crate::types::snapshot::TaskSnapshot;

/// Lifecycle state of a task aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    /// Work is in flight.
    #[default]
    Active,
    /// Work finished; the decay timer is counting down.
    Complete,
    /// Retired. Terminal; no transitions out.
    Destroyed,
}

impl TaskState {
    /// Returns `true` for the terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Destroyed)
    }
}

/// Render output of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRender {
    /// Whether the task reports complete.
    pub complete: bool,
    /// Formatted display message.
    pub message: String,
}

/// Live render state for one unit of work.
#[derive(Debug, Default)]
pub struct TaskAggregate {
    title: Option<String>,
    message: Option<String>,
    percentage: Option<f64>,
    state: TaskState,
    decay: DecayTimer,
}

impl TaskAggregate {
    /// Creates an empty, active aggregate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one snapshot through the state machine.
    ///
    /// Any update cancels a pending decay first: an `end` directly followed
    /// by another `begin` for the same slot must not leave a stale pending
    /// destruction. When the snapshot is terminal, `on_decay` is armed for
    /// `config.task_decay` and will run with the timer's epoch; the caller
    /// turns that into a retirement request.
    pub fn update<F>(&mut self, snapshot: &TaskSnapshot, config: &WatchConfig, on_decay: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        if self.state.is_terminal() {
            // Destruction won the race; drop the update.
            tracing::debug!(token = %snapshot.token, "update for destroyed task ignored");
            return;
        }

        self.decay.cancel();

        if let Some(title) = &snapshot.title {
            self.title = Some(title.clone());
        }

        if snapshot.done {
            self.state = TaskState::Complete;
            if self.percentage.is_some() {
                self.percentage = Some(100.0);
            }
            self.message = Some(
                snapshot
                    .message
                    .clone()
                    .unwrap_or_else(|| config.end_message.clone()),
            );
            self.arm_decay(config.task_decay, on_decay);
        } else {
            self.state = TaskState::Active;
            if let Some(pct) = snapshot.percentage {
                self.percentage = Some(pct);
            }
            if snapshot.message.is_some() {
                self.message = snapshot.message.clone();
            } else if self.message.is_none() {
                self.message = Some(config.begin_message.clone());
            }
        }
    }

    /// Produces `{complete, message}` through the configured formatter.
    pub fn render(&self, config: &WatchConfig) -> TaskRender {
        TaskRender {
            complete: self.state == TaskState::Complete,
            message: (config.format)(
                self.title.as_deref(),
                self.message.as_deref().unwrap_or_default(),
                self.percentage,
            ),
        }
    }

    /// Marks the aggregate destroyed and drops its timer. Idempotent.
    pub fn destroy(&mut self) {
        self.decay.cancel();
        self.state = TaskState::Destroyed;
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// Returns `true` once the task has completed (and is not destroyed).
    pub fn is_complete(&self) -> bool {
        self.state == TaskState::Complete
    }

    /// Epoch a decay firing must carry to still be current.
    pub fn decay_epoch(&self) -> u64 {
        self.decay.epoch()
    }

    /// Returns `true` while a decay firing is pending.
    pub fn decay_armed(&self) -> bool {
        self.decay.is_armed()
    }

    fn arm_decay<F>(&mut self, delay: Duration, on_decay: F)
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.decay.arm(delay, on_decay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn snap(done: bool) -> TaskSnapshot {
        TaskSnapshot {
            name: "w".to_string(),
            token: "t".into(),
            title: None,
            message: None,
            percentage: None,
            done,
            progress: true,
        }
    }

    fn config() -> WatchConfig {
        WatchConfig::default()
    }

    #[tokio::test]
    async fn first_active_snapshot_adopts_fields_and_defaults() {
        let mut task = TaskAggregate::new();
        let mut s = snap(false);
        s.title = Some("index".to_string());
        s.percentage = Some(10.0);
        task.update(&s, &config(), |_| {});

        assert_eq!(task.state(), TaskState::Active);
        let render = task.render(&config());
        assert!(!render.complete);
        // No message yet, so the begin default is used.
        assert_eq!(render.message, "Started (10%) [index]");
    }

    #[tokio::test]
    async fn merge_does_not_overwrite_with_absent_fields() {
        let mut task = TaskAggregate::new();
        let mut s = snap(false);
        s.title = Some("index".to_string());
        s.message = Some("scanning".to_string());
        task.update(&s, &config(), |_| {});

        // A later snapshot with no title/message keeps the earlier values.
        let mut s = snap(false);
        s.percentage = Some(80.0);
        task.update(&s, &config(), |_| {});

        let render = task.render(&config());
        assert_eq!(render.message, "scanning (80%) [index]");
    }

    #[tokio::test]
    async fn completion_forces_percentage_and_end_message() {
        let mut task = TaskAggregate::new();
        let mut s = snap(false);
        s.percentage = Some(40.0);
        task.update(&s, &config(), |_| {});

        task.update(&snap(true), &config(), |_| {});
        assert_eq!(task.state(), TaskState::Complete);

        let render = task.render(&config());
        assert!(render.complete);
        assert_eq!(render.message, "Completed (100%)");
    }

    #[tokio::test]
    async fn completion_without_observed_percentage_leaves_it_out() {
        let mut task = TaskAggregate::new();
        task.update(&snap(false), &config(), |_| {});
        task.update(&snap(true), &config(), |_| {});

        let render = task.render(&config());
        assert_eq!(render.message, "Completed");
    }

    #[tokio::test]
    async fn completion_arms_decay() {
        let mut task = TaskAggregate::new();
        task.update(&snap(true), &config(), |_| {});
        assert!(task.decay_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn decay_fires_with_current_epoch() {
        let fired = Arc::new(AtomicU64::new(u64::MAX));
        let mut task = TaskAggregate::new();

        let fired_clone = fired.clone();
        task.update(
            &snap(true),
            &config().with_task_decay(Duration::from_millis(100)),
            move |epoch| fired_clone.store(epoch, Ordering::SeqCst),
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(fired.load(Ordering::SeqCst), task.decay_epoch());
    }

    #[tokio::test(start_paused = true)]
    async fn rebegin_after_completion_cancels_decay() {
        let fired = Arc::new(AtomicU64::new(0));
        let mut task = TaskAggregate::new();

        let fired_clone = fired.clone();
        task.update(
            &snap(true),
            &config().with_task_decay(Duration::from_millis(100)),
            move |_| {
                fired_clone.fetch_add(1, Ordering::SeqCst);
            },
        );

        // New begin before the timer fires: back to Active, timer dead.
        task.update(&snap(false), &config(), |_| {});
        assert_eq!(task.state(), TaskState::Active);
        assert!(!task.decay_armed());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn destroy_is_terminal_and_idempotent() {
        let mut task = TaskAggregate::new();
        task.update(&snap(true), &config(), |_| {});

        task.destroy();
        task.destroy();
        assert_eq!(task.state(), TaskState::Destroyed);
        assert!(task.state().is_terminal());

        // Updates after destruction are dropped.
        task.update(&snap(false), &config(), |_| {});
        assert_eq!(task.state(), TaskState::Destroyed);
    }
}
