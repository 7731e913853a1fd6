//! Runtime configuration for the ingestion pipeline.
//!
//! The crate consumes a fully-formed [`WatchConfig`]; loading and merging
//! configuration sources is the host's concern.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{
    DEFAULT_BEGIN_MESSAGE, DEFAULT_CLIENT_DECAY_MS, DEFAULT_END_MESSAGE, DEFAULT_TASK_DECAY_MS,
};

/// Formats a task's render message from `(title, message, percentage)`.
pub type FormatFn = Arc<dyn Fn(Option<&str>, &str, Option<f64>) -> String + Send + Sync>;

/// Configuration surface consumed by the dispatcher and aggregates.
///
/// Construct with [`WatchConfig::default`] and refine with the `with_*`
/// builder methods.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use opwatch::WatchConfig;
///
/// let config = WatchConfig::default()
///     .with_task_decay(Duration::from_millis(500))
///     .with_end_message("done");
/// assert_eq!(config.task_decay, Duration::from_millis(500));
/// assert_eq!(config.end_message, "done");
/// assert!(config.enabled);
/// ```
#[derive(Clone)]
pub struct WatchConfig {
    /// Whether ingestion runs at all. Can be toggled at runtime through the
    /// dispatcher.
    pub enabled: bool,

    /// Decay interval for a completed task aggregate.
    pub task_decay: Duration,

    /// Decay interval for a fully-complete client aggregate.
    pub client_decay: Duration,

    /// Message adopted by a task that began without one.
    pub begin_message: String,

    /// Message adopted by a task that ended without one.
    pub end_message: String,

    /// Render formatting function for task messages.
    pub format: FormatFn,
}

impl WatchConfig {
    /// Sets the enabled flag.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the task decay interval.
    pub fn with_task_decay(mut self, decay: Duration) -> Self {
        self.task_decay = decay;
        self
    }

    /// Sets the client decay interval.
    pub fn with_client_decay(mut self, decay: Duration) -> Self {
        self.client_decay = decay;
        self
    }

    /// Sets the default begin message.
    pub fn with_begin_message(mut self, message: impl Into<String>) -> Self {
        self.begin_message = message.into();
        self
    }

    /// Sets the default end message.
    pub fn with_end_message(mut self, message: impl Into<String>) -> Self {
        self.end_message = message.into();
        self
    }

    /// Replaces the render formatting function.
    pub fn with_format(
        mut self,
        format: impl Fn(Option<&str>, &str, Option<f64>) -> String + Send + Sync + 'static,
    ) -> Self {
        self.format = Arc::new(format);
        self
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            task_decay: Duration::from_millis(DEFAULT_TASK_DECAY_MS),
            client_decay: Duration::from_millis(DEFAULT_CLIENT_DECAY_MS),
            begin_message: DEFAULT_BEGIN_MESSAGE.to_string(),
            end_message: DEFAULT_END_MESSAGE.to_string(),
            format: Arc::new(default_format),
        }
    }
}

impl fmt::Debug for WatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchConfig")
            .field("enabled", &self.enabled)
            .field("task_decay", &self.task_decay)
            .field("client_decay", &self.client_decay)
            .field("begin_message", &self.begin_message)
            .field("end_message", &self.end_message)
            .finish_non_exhaustive()
    }
}

/// Default task message format: `"<message> (<pct>%) [<title>]"`, with the
/// percentage and title segments dropped when absent.
///
/// # Examples
///
/// ```
/// use opwatch::default_format;
///
/// assert_eq!(
///     default_format(Some("indexing"), "3/7 crates", Some(42.0)),
///     "3/7 crates (42%) [indexing]"
/// );
/// assert_eq!(default_format(None, "loading", None), "loading");
/// ```
pub fn default_format(title: Option<&str>, message: &str, percentage: Option<f64>) -> String {
    let mut out = String::from(message);
    if let Some(pct) = percentage {
        out.push_str(&format!(" ({pct:.0}%)"));
    }
    if let Some(title) = title {
        if !title.is_empty() {
            out.push_str(&format!(" [{title}]"));
        }
    }
    out
}
