// ── Store error taxonomy ──
//
// Failure modes of the hierarchical coordination service. vmesh-core
// translates these into its own domain-level variants; consumers of this
// crate never see backend-internal error types.

use thiserror::Error;

/// Errors surfaced by a [`ConfigStore`](crate::ConfigStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A create addressed a path that already exists.
    #[error("node already exists: {path}")]
    NodeExists { path: String },

    /// The addressed node — or a parent it requires — does not exist.
    #[error("node not found: {path}")]
    NoNode { path: String },

    /// A delete addressed a node that still has children.
    #[error("node not empty: {path}")]
    NotEmpty { path: String },

    /// The backend is unreachable or the session was lost mid-operation.
    #[error("store unavailable: {reason}")]
    Unavailable { reason: String },
}

impl StoreError {
    pub fn node_exists(path: impl Into<String>) -> Self {
        Self::NodeExists { path: path.into() }
    }

    pub fn no_node(path: impl Into<String>) -> Self {
        Self::NoNode { path: path.into() }
    }

    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty { path: path.into() }
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a transient infrastructure failure worth
    /// retrying. Everything else reflects the actual state of the tree and
    /// requires the caller to re-read before resubmitting.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}
