//! Wire-facing types: tokens, normalized payloads, worker identity, and
//! digestion snapshots.

pub mod payload;
pub mod snapshot;
pub mod worker;

pub use payload::{
    BeginProgress, EndProgress, ProgressKind, ProgressPayload, ProgressToken, ReportProgress,
};
pub use snapshot::{Digest, TaskSnapshot};
pub use worker::{StaticDirectory, WorkerDirectory, WorkerId, WorkerInfo};
