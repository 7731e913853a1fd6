//! Progress tokens and the normalized payload union.
//!
//! Workers report progress as loosely-shaped notification values. This module
//! classifies a raw [`serde_json::Value`] into the [`ProgressPayload`] tagged
//! union exactly once, at ingestion time; all downstream code matches on the
//! tag instead of probing fields.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Opaque identifier scoping one logical unit of progress within a worker.
///
/// Tokens arrive as either strings or integers on the wire and may be reused
/// by the worker after the operation they scoped has completed.
///
/// # Examples
///
/// ```
/// use opwatch::ProgressToken;
///
/// let s: ProgressToken = "indexing".into();
/// let n: ProgressToken = 7.into();
/// assert_eq!(s.to_string(), "indexing");
/// assert_eq!(n.to_string(), "7");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProgressToken {
    /// String token
    String(String),
    /// Numeric token
    Number(i64),
}

impl ProgressToken {
    /// Extracts a token from a raw JSON value, accepting strings and integers.
    ///
    /// Returns `None` for any other shape (floats, objects, null, ...) --
    /// those are protocol violations handled by the caller.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) => n.as_i64().map(Self::Number),
            _ => None,
        }
    }
}

impl fmt::Display for ProgressToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for ProgressToken {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<i64> for ProgressToken {
    fn from(n: i64) -> Self {
        Self::Number(n)
    }
}

/// The shape a progress entry was last written by.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    /// Entry was created by a `begin` notification.
    Begin,
    /// Entry was last merged from a `report` notification.
    Report,
    /// Entry was finished by an `end` notification.
    End,
    /// Entry came from a payload with no `kind` discriminator (one-shot,
    /// already terminal).
    #[default]
    Unspecified,
}

impl fmt::Display for ProgressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Begin => write!(f, "begin"),
            Self::Report => write!(f, "report"),
            Self::End => write!(f, "end"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Fields carried by a `begin` notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeginProgress {
    /// Operation title, e.g. `"indexing"`.
    pub title: Option<String>,
    /// Initial human-readable message.
    pub message: Option<String>,
    /// Initial percentage in `[0, 100]`.
    pub percentage: Option<f64>,
}

/// Fields carried by a `report` notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportProgress {
    /// Updated human-readable message.
    pub message: Option<String>,
    /// Updated percentage in `[0, 100]`.
    pub percentage: Option<f64>,
}

/// Fields carried by an `end` notification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EndProgress {
    /// Final human-readable message.
    pub message: Option<String>,
}

/// Normalized progress payload, classified once at ingestion time.
///
/// The wire shape is duck-typed: a record with an optional `kind`
/// discriminator, or any bare value at all. [`classify`](Self::classify)
/// resolves that ambiguity into this union so the rest of the pipeline never
/// probes raw JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressPayload {
    /// Create-or-overwrite the entry for this token.
    Begin(BeginProgress),
    /// Merge message/percentage into the existing entry.
    Report(ReportProgress),
    /// Merge the final message and mark the entry done.
    End(EndProgress),
    /// No recognized `kind` discriminator: a one-shot, already-terminal
    /// value stored as-is.
    Opaque(Value),
}

impl ProgressPayload {
    /// Classifies a raw notification value.
    ///
    /// A non-object value is first wrapped as `{"content": value}`. If the
    /// (wrapped) record carries a recognized `kind` of `begin`, `report`, or
    /// `end`, the matching variant is extracted; any other shape -- no
    /// `kind`, or an unrecognized one -- becomes [`ProgressPayload::Opaque`].
    ///
    /// Percentages are clamped to `[0, 100]` here, so downstream code can
    /// rely on the data-model invariant.
    ///
    /// # Examples
    ///
    /// ```
    /// use opwatch::{BeginProgress, ProgressPayload};
    /// use serde_json::json;
    ///
    /// let p = ProgressPayload::classify(json!({
    ///     "kind": "begin", "title": "indexing", "percentage": 250.0,
    /// }));
    /// assert_eq!(
    ///     p,
    ///     ProgressPayload::Begin(BeginProgress {
    ///         title: Some("indexing".to_string()),
    ///         message: None,
    ///         percentage: Some(100.0), // clamped
    ///     })
    /// );
    ///
    /// // A bare scalar is a one-shot terminal value.
    /// let p = ProgressPayload::classify(json!("ok"));
    /// assert_eq!(p, ProgressPayload::Opaque(json!({"content": "ok"})));
    /// ```
    pub fn classify(value: Value) -> Self {
        let value = if value.is_object() {
            value
        } else {
            json!({ "content": value })
        };

        match value.get("kind").and_then(Value::as_str) {
            Some("begin") => Self::Begin(BeginProgress {
                title: field_str(&value, "title"),
                message: field_str(&value, "message"),
                percentage: field_pct(&value),
            }),
            Some("report") => Self::Report(ReportProgress {
                message: field_str(&value, "message"),
                percentage: field_pct(&value),
            }),
            Some("end") => Self::End(EndProgress {
                message: field_str(&value, "message"),
            }),
            _ => Self::Opaque(value),
        }
    }

    /// The [`ProgressKind`] this payload stamps onto its entry.
    pub fn kind(&self) -> ProgressKind {
        match self {
            Self::Begin(_) => ProgressKind::Begin,
            Self::Report(_) => ProgressKind::Report,
            Self::End(_) => ProgressKind::End,
            Self::Opaque(_) => ProgressKind::Unspecified,
        }
    }
}

fn field_str(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn field_pct(value: &Value) -> Option<f64> {
    value
        .get("percentage")
        .and_then(Value::as_f64)
        .map(|p| p.clamp(0.0, 100.0))
}
