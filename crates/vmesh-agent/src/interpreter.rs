// ── Command interpretation contracts ──
//
// Consumed interfaces: the control plane defines sequencing, error
// capture, and idempotency; the dataplane side effects behind
// `execute()` live elsewhere.

use thiserror::Error;
use tracing::info;

use vmesh_core::HostCommand;

/// Failure of a command's interpretation or of one of its actions.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ExecutionError {
    pub message: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// One executable dataplane action.
///
/// Runs to completion once dispatched — there is no mid-flight
/// cancellation; failure is signaled through the returned error.
pub trait CommandExecutor: Send {
    fn execute(&mut self) -> Result<(), ExecutionError>;
}

/// Translates a command descriptor into its ordered action list.
///
/// Actions are applied in the order returned (later actions may depend
/// on earlier ones, e.g. plug-before-configure).
pub trait CommandInterpreter: Send + Sync {
    fn interpret(
        &self,
        command: &HostCommand,
    ) -> Result<Vec<Box<dyn CommandExecutor>>, ExecutionError>;
}

/// Development interpreter: logs each command, no dataplane side
/// effects. The default for locally-run agents.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOnly;

struct LogAction {
    interface: String,
    payload: serde_json::Value,
}

impl CommandExecutor for LogAction {
    fn execute(&mut self) -> Result<(), ExecutionError> {
        info!(interface = %self.interface, payload = %self.payload, "command applied (log-only)");
        Ok(())
    }
}

impl CommandInterpreter for LogOnly {
    fn interpret(
        &self,
        command: &HostCommand,
    ) -> Result<Vec<Box<dyn CommandExecutor>>, ExecutionError> {
        Ok(vec![Box::new(LogAction {
            interface: command.interface_name.clone(),
            payload: command.payload.clone(),
        })])
    }
}
