//! Progress events emitted by long-running batch operations.
//!
//! Events are rendered by the dashboard as a terminal-style log. A stream of
//! events always ends with [`ProgressEvent::done`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Message carried by the terminating sentinel event.
pub const DONE_MESSAGE: &str = "DONE";

/// Severity / kind of a progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressKind {
    Info,
    Success,
    Warning,
    Error,
    Progress,
}

/// One line of progress output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ProgressKind,
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    #[must_use]
    pub fn new(kind: ProgressKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            timestamp: Utc::now(),
        }
    }

    /// The stream terminator.
    #[must_use]
    pub fn done() -> Self {
        Self::new(ProgressKind::Success, DONE_MESSAGE)
    }

    #[must_use]
    pub fn is_done(&self) -> bool {
        self.kind == ProgressKind::Success && self.message == DONE_MESSAGE
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let event = ProgressEvent::new(ProgressKind::Warning, "batch 2 partial");
        let json: serde_json::Value = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "warning");
        assert_eq!(json["message"], "batch 2 partial");
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_done_sentinel() {
        assert!(ProgressEvent::done().is_done());
        assert!(!ProgressEvent::new(ProgressKind::Info, DONE_MESSAGE).is_done());
    }
}
