//! The render-sink seam toward the host's display graph.
//!
//! The reactive node/graph machinery that propagates render output to actual
//! UI is an external collaborator. This crate only publishes
//! [`RenderEvent`]s through a plain callback; the host wires them into
//! whatever consumer topology it runs.

use std::sync::Arc;

use crate::aggregate::client::ClientRender;

/// Something a display consumer would want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// A client's composed output changed.
    ClientChanged {
        /// Worker name (registry key).
        name: String,
        /// The new render output.
        render: ClientRender,
    },
    /// A client aggregate was destroyed and should disappear from display.
    ClientRemoved {
        /// Worker name (registry key).
        name: String,
    },
}

/// Callback receiving render events.
///
/// The dispatcher never holds internal locks while invoking the sink, so the
/// callback may call back into the dispatcher.
pub type RenderSink = Arc<dyn Fn(RenderEvent) + Send + Sync>;

/// A sink that drops every event. Useful for headless operation and tests
/// that inspect the dispatcher directly.
pub fn noop_sink() -> RenderSink {
    Arc::new(|_| {})
}
