//! Default intervals and messages for progress aggregates.

/// Default decay interval for a completed task aggregate, in milliseconds.
pub const DEFAULT_TASK_DECAY_MS: u64 = 1_000;

/// Default decay interval for a completed client aggregate, in milliseconds.
pub const DEFAULT_CLIENT_DECAY_MS: u64 = 2_000;

/// Message shown for a task that began without one.
pub const DEFAULT_BEGIN_MESSAGE: &str = "Started";

/// Message shown for a task that ended without one.
pub const DEFAULT_END_MESSAGE: &str = "Completed";
