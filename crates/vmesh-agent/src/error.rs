use thiserror::Error;

use vmesh_core::TopologyError;

/// Agent-level failures: store bookkeeping and configuration. Command
/// execution failures are NOT here — they are recorded in the host's
/// error log and never propagate.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("configuration error: {0}")]
    Config(#[from] vmesh_config::ConfigError),
}

impl AgentError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Topology(e) if e.is_retryable())
    }
}
