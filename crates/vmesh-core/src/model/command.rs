use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::CommandId;

/// A unit of work queued for one host agent.
///
/// The payload is opaque to the control plane; the host-side interpreter
/// turns it into executable actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostCommand {
    /// Target network interface on the host.
    pub interface_name: String,

    /// Action descriptor, interpreted host-side.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl HostCommand {
    pub fn new(interface_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            interface_name: interface_name.into(),
            payload,
        }
    }
}

/// Record of one failed command execution, written back to the store for
/// later inspection. Never blocks subsequent command processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub command_id: CommandId,
    pub interface_name: String,
    pub error: String,
    pub logged_at: DateTime<Utc>,
}

impl ErrorLogEntry {
    pub fn new(
        command_id: CommandId,
        interface_name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            command_id,
            interface_name: interface_name.into(),
            error: error.into(),
            logged_at: Utc::now(),
        }
    }
}
