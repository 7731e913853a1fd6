//! Live render-producing aggregates derived from progress snapshots.

pub mod client;
pub mod task;

pub use client::{ClientAggregate, ClientRender};
pub use task::{TaskAggregate, TaskRender, TaskState};
