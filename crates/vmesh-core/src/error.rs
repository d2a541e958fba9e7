// ── Topology error taxonomy ──
//
// Administrative callers see these, never raw store errors. The
// `From<StoreError>` impl is the single translation point.

use thiserror::Error;

use vmesh_store::StoreError;

/// Errors surfaced by topology mutations and host bookkeeping.
#[derive(Debug, Error)]
pub enum TopologyError {
    /// An identity the transaction tried to create already exists, or a
    /// delete target still has dependents. Reflects a concurrent
    /// topology change: re-read current state and rebuild the op list
    /// before retrying.
    #[error("conflicting topology state at {path}")]
    Conflict { path: String },

    /// An entity the transaction expected to exist is absent.
    #[error("no such entity: {path}")]
    NotFound { path: String },

    /// Transient infrastructure failure. The whole build-and-apply cycle
    /// may be retried as-is.
    #[error("coordination store unavailable: {reason}")]
    StoreUnavailable { reason: String },

    /// A payload could not be encoded or decoded. Non-retryable; this is
    /// a logic bug, not a state conflict.
    #[error("could not serialize {what}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl TopologyError {
    /// `true` if the caller may resubmit the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<StoreError> for TopologyError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NodeExists { path } | StoreError::NotEmpty { path } => {
                Self::Conflict { path }
            }
            StoreError::NoNode { path } => Self::NotFound { path },
            StoreError::Unavailable { reason } => Self::StoreUnavailable { reason },
        }
    }
}
