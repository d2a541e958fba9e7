// ── Tunnel-key allocator ──
//
// Keys come from two places: the free set (keys released by deleted
// bridges) and a per-parent sequential counter in the store. Both paths
// are single atomic store operations — there is no read-then-write
// window for two allocators to collide in.

use std::sync::Arc;

use tracing::debug;

use vmesh_store::{ConfigStore, StoreError, StoreOp};

use crate::codec;
use crate::error::TopologyError;
use crate::model::{TunnelKey, TunnelKeyConfig};
use crate::paths::{PathBuilder, TUNNEL_KEY_PREFIX};

/// Issues unique tunnel keys, each owned by exactly one bridge.
pub struct TunnelKeyAllocator<S> {
    store: Arc<S>,
    paths: PathBuilder,
}

impl<S: ConfigStore> TunnelKeyAllocator<S> {
    pub fn new(store: Arc<S>, paths: PathBuilder) -> Self {
        Self { store, paths }
    }

    /// Allocate an unused key and atomically mark it used.
    ///
    /// Freed keys are reclaimed first (lowest number wins); when the free
    /// set is empty a fresh key is minted from the store's sequential
    /// counter. A lost reclaim race is retried against the refreshed free
    /// set. On a transient store failure the caller must not assume a key
    /// was consumed.
    pub async fn allocate(&self) -> Result<TunnelKey, TopologyError> {
        loop {
            let free = self.store.children(&self.paths.tunnel_keys_free()).await?;
            let reclaim = free.iter().filter_map(|name| name.parse::<u64>().ok()).min();

            let Some(key) = reclaim else {
                let data = codec::encode(&TunnelKeyConfig::default(), "TunnelKeyConfig")?;
                let key = self
                    .store
                    .create_sequential(&self.paths.tunnel_keys(), TUNNEL_KEY_PREFIX, data)
                    .await?;
                debug!(key, "minted fresh tunnel key");
                return Ok(key);
            };

            let data = codec::encode(&TunnelKeyConfig::default(), "TunnelKeyConfig")?;
            let claim = vec![
                StoreOp::delete(self.paths.tunnel_key_free(key)),
                StoreOp::create(self.paths.tunnel_key(key), data),
            ];
            match self.store.submit(claim).await {
                Ok(()) => {
                    debug!(key, "reclaimed freed tunnel key");
                    return Ok(key);
                }
                // Another allocator claimed this key between the
                // enumeration and our transaction; re-read the free set.
                Err(StoreError::NoNode { .. } | StoreError::NodeExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Return a key to the free set.
    ///
    /// Callers invoke this only after the transaction that removed the
    /// last reference to the key has been confirmed — never from inside
    /// the deleting op list itself. Releasing an already-freed key is a
    /// no-op.
    pub async fn release(&self, key: TunnelKey) -> Result<(), TopologyError> {
        let ops = vec![
            StoreOp::delete(self.paths.tunnel_key(key)),
            StoreOp::create(self.paths.tunnel_key_free(key), Vec::new()),
        ];
        match self.store.submit(ops).await {
            Ok(()) => {
                debug!(key, "tunnel key released");
                Ok(())
            }
            // Key node already gone or free marker already present:
            // the key is released, nothing left to do.
            Err(StoreError::NoNode { .. } | StoreError::NodeExists { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
