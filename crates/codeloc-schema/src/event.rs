//! ---
//! codeloc_section: "02-origins-schema"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Shared schema definitions for origins and events."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of transition detected by a watch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationStateChangeKind {
    /// The server behind the location restarted under a new server id.
    Updated,
    /// The server could not be reached within the retry budget.
    Error,
}

impl LocationStateChangeKind {
    /// Lowercase label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Updated => "updated",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LocationStateChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Notification delivered to location state subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationStateChangeEvent {
    /// What happened.
    pub kind: LocationStateChangeKind,
    /// Location the event concerns.
    pub location_name: String,
    /// Human-readable description.
    pub message: String,
    /// New server id for [`LocationStateChangeKind::Updated`].
    #[serde(default)]
    pub server_id: Option<String>,
    /// When the watch loop detected the transition.
    pub observed_at: DateTime<Utc>,
}

impl LocationStateChangeEvent {
    /// The server restarted and now reports `server_id`.
    pub fn updated(location_name: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            kind: LocationStateChangeKind::Updated,
            location_name: location_name.into(),
            message: "Server has been updated.".to_owned(),
            server_id: Some(server_id.into()),
            observed_at: Utc::now(),
        }
    }

    /// The server stayed unreachable after every reconnect attempt.
    pub fn error(location_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: LocationStateChangeKind::Error,
            location_name: location_name.into(),
            message: message.into(),
            server_id: None,
            observed_at: Utc::now(),
        }
    }
}
