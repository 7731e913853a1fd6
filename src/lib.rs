//! Live progress ingestion for concurrent workers.
//!
//! `opwatch` digests an unordered, partially-duplicated, partially-missing
//! stream of begin/report/end progress notifications into a consistent
//! per-worker, per-task render model, with decay-based cleanup so finished
//! work disappears on its own and nothing leaks.
//!
//! # Overview
//!
//! Raw notification payloads are classified once into the
//! [`ProgressPayload`] union and applied to the insertion-ordered
//! [`ProgressStore`]. A digestion pass flattens the store into per-worker
//! [`TaskSnapshot`] sequences; the [`Dispatcher`] feeds those to
//! [`TaskAggregate`]/[`ClientAggregate`] state machines whose decay timers
//! retire completed work after a configurable delay. Render output leaves
//! the crate through a plain callback sink; the host's display machinery
//! stays external.
//!
//! # Module Organization
//!
//! - [`types`] - tokens, normalized payloads, worker identity, snapshots
//! - [`store`] - the single-writer progress table and its digestion pass
//! - [`aggregate`] - task and client render state machines
//! - [`dispatch`] - ingestion callback, pump loop, retirement processing
//! - [`timer`] - the epoch-guarded cancellable decay timer
//! - [`sink`] - render events toward the host display graph
//! - [`config`] / [`error`] / [`constants`] - configuration surface,
//!   diagnostic taxonomy, defaults
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use opwatch::{noop_sink, Dispatcher, StaticDirectory, WatchConfig, WorkerId};
//! use serde_json::json;
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_time().build().unwrap();
//! # rt.block_on(async {
//! let directory = Arc::new(StaticDirectory::default().with_worker(7, "rust-analyzer"));
//! let dispatcher = Dispatcher::new(WatchConfig::default(), directory, noop_sink());
//!
//! // Transport delivers a begin, then an end, for the same token.
//! dispatcher.on_notification(
//!     WorkerId(7),
//!     &json!({"token": "build", "value": {"kind": "begin", "title": "building"}}),
//! );
//! dispatcher.pump();
//! dispatcher.on_notification(
//!     WorkerId(7),
//!     &json!({"token": "build", "value": {"kind": "end", "message": "built 12 crates"}}),
//! );
//! dispatcher.pump();
//!
//! let render = dispatcher.peek("rust-analyzer").unwrap();
//! assert!(render.complete);
//! assert_eq!(render.body, "built 12 crates [building]");
//! # });
//! ```

pub mod aggregate;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod sink;
pub mod store;
pub mod timer;
pub mod types;

#[cfg(feature = "logging")]
pub mod logging;

// Re-exports for ergonomic access
pub use aggregate::{ClientAggregate, ClientRender, TaskAggregate, TaskRender, TaskState};
pub use config::{default_format, FormatFn, WatchConfig};
pub use constants::*;
pub use dispatch::{Dispatcher, Retirement};
pub use error::{Result, WatchError};
pub use sink::{noop_sink, RenderEvent, RenderSink};
pub use store::{ApplyOutcome, ProgressEntry, ProgressStore};
pub use timer::DecayTimer;
pub use types::{
    BeginProgress, Digest, EndProgress, ProgressKind, ProgressPayload, ProgressToken,
    ReportProgress, StaticDirectory, TaskSnapshot, WorkerDirectory, WorkerId, WorkerInfo,
};
