// ── ConfigStore contract ──
//
// The coordination-service semantics every backend must honor: creates
// require a live parent, deletes require a childless node, transactions
// are all-or-nothing, and watches are one-shot.

use tokio::sync::oneshot;

use crate::error::StoreError;
use crate::ops::StoreOp;

/// Node payload plus its modification version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeData {
    pub data: Vec<u8>,
    /// Bumped on every `set_data`; 0 for a freshly created node.
    pub version: u64,
}

/// Why a one-shot child watch fired.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// The watched node gained or lost a child.
    ChildrenChanged { path: String },

    /// The backend dropped the subscription (session loss, shutdown).
    /// Holders should re-enumerate and re-arm rather than give up.
    Lost,
}

/// Handle for a single pending child-watch notification.
///
/// Watches are one-shot: once [`wait`](Self::wait) resolves, the
/// subscription is spent and must be re-armed with another
/// [`ConfigStore::children_and_watch`] call. A missed re-arm silently
/// stops future delivery, so holders re-arm before processing.
#[derive(Debug)]
pub struct ChildWatch {
    rx: oneshot::Receiver<WatchEvent>,
}

impl ChildWatch {
    pub fn new(rx: oneshot::Receiver<WatchEvent>) -> Self {
        Self { rx }
    }

    /// Wait for the notification. A torn-down backend resolves to
    /// [`WatchEvent::Lost`] rather than hanging forever.
    pub async fn wait(self) -> WatchEvent {
        self.rx.await.unwrap_or(WatchEvent::Lost)
    }
}

/// Contract of the hierarchical, versioned, transactional, watchable
/// coordination service backing all vmesh state.
///
/// The production backend is an external service; this crate's
/// [`MemoryStore`](crate::MemoryStore) implements the same contract
/// in-process for tests and local development. Components are generic
/// over `S: ConfigStore` and never assume a particular backend.
#[allow(async_fn_in_trait)]
pub trait ConfigStore: Send + Sync {
    /// Create a node with an attached payload.
    async fn create(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Create a sequentially-named child `<prefix><seq>` under `parent`
    /// and return the minted sequence number.
    ///
    /// Counters are per-parent, persisted, and monotonic: a deleted
    /// child's number is never handed out again. This is the atomic
    /// allocation primitive — callers never read-then-write a counter.
    async fn create_sequential(
        &self,
        parent: &str,
        prefix: &str,
        data: Vec<u8>,
    ) -> Result<u64, StoreError>;

    /// Read a node's payload and version.
    async fn get(&self, path: &str) -> Result<NodeData, StoreError>;

    /// Replace a node's payload.
    async fn set_data(&self, path: &str, data: Vec<u8>) -> Result<(), StoreError>;

    /// Delete a childless node.
    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Whether a node exists.
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Immediate child names (not full paths), sorted ascending.
    async fn children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Enumerate children and arm a one-shot child watch in a single
    /// call, so no change between enumeration and subscription can be
    /// missed.
    async fn children_and_watch(
        &self,
        path: &str,
    ) -> Result<(Vec<String>, ChildWatch), StoreError>;

    /// Apply `ops` as one atomic transaction: all succeed or none apply.
    /// The error names the first op that failed validation.
    async fn submit(&self, ops: Vec<StoreOp>) -> Result<(), StoreError>;
}
