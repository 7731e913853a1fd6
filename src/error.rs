//! Diagnostic error types for the ingestion pipeline.
//!
//! Nothing in this crate propagates an error to the host: every failure mode
//! is a diagnostic, logged and survived. [`WatchError`] exists so the dispatch
//! layer has one typed taxonomy to log from, and so tests can assert on the
//! precise violation that occurred.

use thiserror::Error;

use crate::types::payload::{ProgressKind, ProgressToken};
use crate::types::worker::WorkerId;

/// Protocol violations and ingestion failures.
///
/// Every variant is survivable: the pipeline logs it and keeps processing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum WatchError {
    /// The notification payload carried no usable `token` field.
    #[error("notification payload has no usable token")]
    MissingToken,

    /// The worker referenced by a notification is already gone.
    #[error("worker {worker_id} is gone, dropping progress for token {token}")]
    VanishedWorker {
        /// The unresolvable worker id.
        worker_id: WorkerId,
        /// Token the dropped notification referenced.
        token: ProgressToken,
    },

    /// A `report` or `end` referenced a token with no live entry.
    #[error("{kind} for unknown token {token} from worker {worker}")]
    UnknownToken {
        /// Worker name.
        worker: String,
        /// The unknown token.
        token: ProgressToken,
        /// Which notification shape referenced it.
        kind: ProgressKind,
    },

    /// Ingestion is disabled by configuration.
    #[error("progress ingestion is disabled")]
    Disabled,
}

/// Result alias for this crate.
pub type Result<T> = std::result::Result<T, WatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_names_the_violation() {
        let err = WatchError::VanishedWorker {
            worker_id: WorkerId(4),
            token: "tok".into(),
        };
        assert_eq!(
            err.to_string(),
            "worker 4 is gone, dropping progress for token tok"
        );

        let err = WatchError::UnknownToken {
            worker: "analyzer".to_string(),
            token: 12.into(),
            kind: ProgressKind::Report,
        };
        assert_eq!(
            err.to_string(),
            "report for unknown token 12 from worker analyzer"
        );
    }
}
