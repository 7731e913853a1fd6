//! Digestion output types.
//!
//! A digestion pass flattens the progress store into one ordered snapshot
//! sequence per worker. Snapshots serialize with `camelCase` fields and omit
//! absent optionals, so external consumers can take the digest as JSON.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::types::payload::ProgressToken;

/// One task's state as seen by a single digestion pass.
///
/// `token` is the stable join key for matching a task across digestion
/// cycles; `progress` is always `true` on digested snapshots and marks the
/// serialized form for consumers that mix progress items with other
/// notification items.
///
/// # Examples
///
/// ```
/// use opwatch::TaskSnapshot;
///
/// let snap = TaskSnapshot {
///     name: "analyzer".to_string(),
///     token: "indexing".into(),
///     title: Some("indexing".to_string()),
///     message: None,
///     percentage: Some(40.0),
///     done: false,
///     progress: true,
/// };
///
/// let json = serde_json::to_value(&snap).unwrap();
/// assert_eq!(json["name"], "analyzer");
/// assert_eq!(json["percentage"], 40.0);
/// assert_eq!(json["progress"], true);
/// assert!(json.get("message").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    /// Owning worker's name.
    pub name: String,

    /// Protocol token, propagated as the cross-digestion join key.
    pub token: ProgressToken,

    /// Operation title, if one was ever reported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Latest human-readable message, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Latest percentage in `[0, 100]`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,

    /// Whether the underlying operation has finished.
    pub done: bool,

    /// Always `true`: marks this as a progress item.
    pub progress: bool,
}

/// Digestion result: per-worker snapshot sequences, keyed by worker name,
/// in store insertion order.
pub type Digest = IndexMap<String, Vec<TaskSnapshot>>;
