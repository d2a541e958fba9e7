// ── Topology mutator ──
//
// Applies op-builder output as single atomic transactions and
// orchestrates the multi-entity operations (bridge creation allocates
// and binds a tunnel key; bridge deletion enumerates ports and releases
// the key after the transaction is confirmed).
//
// Deletes of an already-absent entity succeed: administrative delete
// calls are safely repeatable, and the REST layer above relies on that.

use std::collections::HashSet;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use vmesh_store::{ConfigStore, StoreError};

use crate::codec;
use crate::error::TopologyError;
use crate::model::{
    BridgeConfig, BridgeId, PortAdminConfig, PortConfig, PortId, TenantConfig, TenantId,
    TunnelKey, TunnelKeyConfig,
};
use crate::paths::PathBuilder;
use crate::topology::keys::TunnelKeyAllocator;
use crate::topology::ops::{self, PortDeletion};

/// Parameters for a new port; everything else is generated or derived.
#[derive(Debug, Clone, Default)]
pub struct NewPort {
    pub inbound_filter: Option<Uuid>,
    pub outbound_filter: Option<Uuid>,
}

/// The transactional topology mutator.
///
/// All topology writes go through here; the store's transaction
/// semantics are the only concurrency control. Conflicting concurrent
/// mutations surface as [`TopologyError::Conflict`] /
/// [`TopologyError::NotFound`] to the losing caller, which must re-read
/// and rebuild rather than retry blindly.
pub struct TopologyManager<S> {
    store: Arc<S>,
    paths: PathBuilder,
    keys: TunnelKeyAllocator<S>,
}

impl<S: ConfigStore> TopologyManager<S> {
    pub fn new(store: Arc<S>, paths: PathBuilder) -> Self {
        let keys = TunnelKeyAllocator::new(Arc::clone(&store), paths.clone());
        Self { store, paths, keys }
    }

    pub fn paths(&self) -> &PathBuilder {
        &self.paths
    }

    pub fn tunnel_keys(&self) -> &TunnelKeyAllocator<S> {
        &self.keys
    }

    /// Create the base container layout if missing. Idempotent.
    pub async fn ensure_base_layout(&self) -> Result<(), TopologyError> {
        for path in self.paths.base_paths() {
            match self.store.create(&path, Vec::new()).await {
                Ok(()) | Err(StoreError::NodeExists { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    // ── Tenants ──────────────────────────────────────────────────────

    pub async fn create_tenant(
        &self,
        tenant_id: &TenantId,
        config: TenantConfig,
    ) -> Result<(), TopologyError> {
        let ops = ops::tenant_create(&self.paths, tenant_id, &config)?;
        self.store.submit(ops).await?;
        info!(tenant = %tenant_id, "tenant created");
        Ok(())
    }

    /// Delete a tenant. Fails with `Conflict` while bridges remain;
    /// succeeds if the tenant is already gone.
    pub async fn delete_tenant(&self, tenant_id: &TenantId) -> Result<(), TopologyError> {
        if !self.store.exists(&self.paths.tenant(tenant_id)).await? {
            return Ok(());
        }
        let ops = ops::tenant_delete(&self.paths, tenant_id);
        self.store.submit(ops).await?;
        info!(tenant = %tenant_id, "tenant deleted");
        Ok(())
    }

    // ── Bridges ──────────────────────────────────────────────────────

    /// Create a bridge under `tenant_id`, allocating and binding its
    /// tunnel key.
    ///
    /// The bridge node, tenant index entry, ports index, and key
    /// back-reference commit in one transaction. Allocation itself is a
    /// separate atomic step, so a failed bridge transaction triggers a
    /// compensating release of the key.
    pub async fn create_bridge(
        &self,
        tenant_id: &TenantId,
        name: &str,
    ) -> Result<BridgeId, TopologyError> {
        let key = self.keys.allocate().await?;
        let id = Uuid::new_v4();
        let config = BridgeConfig {
            name: name.to_owned(),
            tenant_id: tenant_id.clone(),
            tunnel_key: key,
        };

        let ops = ops::bridge_create(&self.paths, id, &config)?;
        match self.store.submit(ops).await {
            Ok(()) => {
                info!(bridge = %id, tenant = %tenant_id, tunnel_key = key, "bridge created");
                Ok(id)
            }
            Err(err) => {
                // Compensate for the already-consumed allocation.
                if let Err(release_err) = self.keys.release(key).await {
                    warn!(
                        tunnel_key = key,
                        error = %release_err,
                        "could not release tunnel key after aborted bridge create"
                    );
                }
                Err(err.into())
            }
        }
    }

    /// Delete a bridge and (per `cascade`) its owned ports. Succeeds if
    /// the bridge is already gone.
    pub async fn delete_bridge(&self, id: BridgeId, cascade: bool) -> Result<(), TopologyError> {
        let Some(config) = self
            .try_read::<BridgeConfig>(&self.paths.bridge(id), "BridgeConfig")
            .await?
        else {
            return Ok(());
        };

        let port_ids = match self.store.children(&self.paths.bridge_ports(id)).await {
            Ok(names) => parse_uuid_children(&names),
            Err(StoreError::NoNode { .. }) => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        let in_set: HashSet<PortId> = port_ids.iter().copied().collect();

        let mut deletions = Vec::with_capacity(port_ids.len());
        for port_id in port_ids {
            let dataplane: Option<PortConfig> =
                self.try_read(&self.paths.port(port_id), "PortConfig").await?;
            let has_admin = self.store.exists(&self.paths.port_admin(port_id)).await?;

            // Only a peer outside the delete set needs an unlink op.
            let mut peer = None;
            if cascade {
                if let Some(peer_id) = dataplane.as_ref().and_then(|c| c.peer_id) {
                    if !in_set.contains(&peer_id) {
                        peer = self
                            .try_read::<PortConfig>(&self.paths.port(peer_id), "PortConfig")
                            .await?
                            .map(|c| (peer_id, c));
                    }
                }
            }

            deletions.push(PortDeletion {
                id: port_id,
                dataplane,
                peer,
                has_admin,
            });
        }

        let ops = ops::bridge_delete(&self.paths, id, &config, &deletions, cascade)?;
        self.store.submit(ops).await?;
        info!(bridge = %id, cascade, "bridge deleted");

        // Release only after the deleting transaction is confirmed, so
        // key reuse cannot race ahead of it. The transaction has already
        // committed, so a failure here leaks the key (never double-owns
        // it) and is logged for an operator sweep.
        if let Err(release_err) = self.keys.release(config.tunnel_key).await {
            error!(
                tunnel_key = config.tunnel_key,
                error = %release_err,
                "bridge deleted but tunnel key release failed"
            );
        }
        Ok(())
    }

    // ── Ports ────────────────────────────────────────────────────────

    pub async fn create_port(
        &self,
        bridge_id: BridgeId,
        request: NewPort,
    ) -> Result<PortId, TopologyError> {
        let id = Uuid::new_v4();
        let config = PortConfig {
            bridge_id,
            inbound_filter: request.inbound_filter,
            outbound_filter: request.outbound_filter,
            peer_id: None,
        };
        let ops = ops::port_create(&self.paths, id, &config, &PortAdminConfig::default())?;
        self.store.submit(ops).await?;
        info!(port = %id, bridge = %bridge_id, "port created");
        Ok(id)
    }

    /// Delete a port. cascade=true removes both the management and the
    /// dataplane records (unlinking a live peer first); cascade=false
    /// removes only the management record. Succeeds if nothing is left
    /// to delete.
    pub async fn delete_port(&self, id: PortId, cascade: bool) -> Result<(), TopologyError> {
        let dataplane: Option<PortConfig> =
            self.try_read(&self.paths.port(id), "PortConfig").await?;
        let has_admin = self.store.exists(&self.paths.port_admin(id)).await?;
        if dataplane.is_none() && !has_admin {
            return Ok(());
        }

        let mut peer = None;
        if cascade {
            if let Some(peer_id) = dataplane.as_ref().and_then(|c| c.peer_id) {
                peer = self
                    .try_read::<PortConfig>(&self.paths.port(peer_id), "PortConfig")
                    .await?
                    .map(|c| (peer_id, c));
            }
        }

        let ops = ops::port_delete(
            &self.paths,
            id,
            dataplane.as_ref(),
            peer.as_ref().map(|(pid, c)| (*pid, c)),
            has_admin,
            cascade,
        )?;
        if ops.is_empty() {
            return Ok(());
        }
        self.store.submit(ops).await?;
        info!(port = %id, cascade, "port deleted");
        Ok(())
    }

    // ── Links ────────────────────────────────────────────────────────

    /// Link two ports: both peer fields are set in one transaction.
    /// Linking an already-linked pair again is a no-op; a port peered
    /// elsewhere is a `Conflict`.
    pub async fn link_ports(&self, id: PortId, peer_id: PortId) -> Result<(), TopologyError> {
        if id == peer_id {
            return Err(TopologyError::Conflict {
                path: self.paths.port(id),
            });
        }
        let config: PortConfig = self.read(&self.paths.port(id), "PortConfig").await?;
        let peer_config: PortConfig = self.read(&self.paths.port(peer_id), "PortConfig").await?;

        if config.peer_id == Some(peer_id) && peer_config.peer_id == Some(id) {
            return Ok(());
        }
        if config.peer_id.is_some() {
            return Err(TopologyError::Conflict {
                path: self.paths.port(id),
            });
        }
        if peer_config.peer_id.is_some() {
            return Err(TopologyError::Conflict {
                path: self.paths.port(peer_id),
            });
        }

        let ops = ops::link_create(&self.paths, id, &config, peer_id, &peer_config)?;
        self.store.submit(ops).await?;
        debug!(port = %id, peer = %peer_id, "ports linked");
        Ok(())
    }

    /// Tear down a port's link, clearing both peer fields together.
    /// A port with no peer is a no-op.
    pub async fn unlink_ports(&self, id: PortId) -> Result<(), TopologyError> {
        let config: PortConfig = self.read(&self.paths.port(id), "PortConfig").await?;
        let Some(peer_id) = config.peer_id else {
            return Ok(());
        };

        let peer_config: Option<PortConfig> = self
            .try_read(&self.paths.port(peer_id), "PortConfig")
            .await?;
        let ops = match peer_config {
            Some(peer_config) => {
                ops::link_delete(&self.paths, id, &config, peer_id, &peer_config)?
            }
            // Dangling reference: the peer node is gone, clear our side.
            None => {
                let mut cleared = config.clone();
                cleared.peer_id = None;
                vec![vmesh_store::StoreOp::set_data(
                    self.paths.port(id),
                    codec::encode(&cleared, "PortConfig")?,
                )]
            }
        };
        self.store.submit(ops).await?;
        debug!(port = %id, peer = %peer_id, "ports unlinked");
        Ok(())
    }

    // ── VIF plug/unplug ──────────────────────────────────────────────

    /// Attach a VIF to a port's management record. Plugging the same VIF
    /// twice is a no-op; a different VIF is a `Conflict`.
    pub async fn plug_port(&self, id: PortId, vif_id: Uuid) -> Result<(), TopologyError> {
        let admin: PortAdminConfig = self
            .read(&self.paths.port_admin(id), "PortAdminConfig")
            .await?;
        match admin.vif_id {
            Some(existing) if existing == vif_id => return Ok(()),
            Some(_) => {
                return Err(TopologyError::Conflict {
                    path: self.paths.port_admin(id),
                });
            }
            None => {}
        }
        let updated = PortAdminConfig {
            vif_id: Some(vif_id),
        };
        let ops = ops::port_admin_update(&self.paths, id, &updated)?;
        self.store.submit(ops).await?;
        info!(port = %id, vif = %vif_id, "port plugged");
        Ok(())
    }

    /// Detach a port's VIF. Already-unplugged is a no-op.
    pub async fn unplug_port(&self, id: PortId) -> Result<(), TopologyError> {
        let admin: PortAdminConfig = self
            .read(&self.paths.port_admin(id), "PortAdminConfig")
            .await?;
        if admin.vif_id.is_none() {
            return Ok(());
        }
        let ops = ops::port_admin_update(&self.paths, id, &PortAdminConfig::default())?;
        self.store.submit(ops).await?;
        info!(port = %id, "port unplugged");
        Ok(())
    }

    // ── Readers ──────────────────────────────────────────────────────

    pub async fn get_tenant(&self, tenant_id: &TenantId) -> Result<TenantConfig, TopologyError> {
        self.read(&self.paths.tenant(tenant_id), "TenantConfig").await
    }

    pub async fn get_bridge(&self, id: BridgeId) -> Result<BridgeConfig, TopologyError> {
        self.read(&self.paths.bridge(id), "BridgeConfig").await
    }

    pub async fn get_port(&self, id: PortId) -> Result<PortConfig, TopologyError> {
        self.read(&self.paths.port(id), "PortConfig").await
    }

    pub async fn get_port_admin(&self, id: PortId) -> Result<PortAdminConfig, TopologyError> {
        self.read(&self.paths.port_admin(id), "PortAdminConfig").await
    }

    pub async fn get_tunnel_key(&self, key: TunnelKey) -> Result<TunnelKeyConfig, TopologyError> {
        self.read(&self.paths.tunnel_key(key), "TunnelKeyConfig").await
    }

    pub async fn list_tenant_bridges(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<BridgeId>, TopologyError> {
        let names = self.store.children(&self.paths.tenant_bridges(tenant_id)).await?;
        Ok(parse_uuid_children(&names))
    }

    pub async fn list_bridge_ports(&self, id: BridgeId) -> Result<Vec<PortId>, TopologyError> {
        let names = self.store.children(&self.paths.bridge_ports(id)).await?;
        Ok(parse_uuid_children(&names))
    }

    // ── Private helpers ──────────────────────────────────────────────

    async fn read<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
    ) -> Result<T, TopologyError> {
        let node = self.store.get(path).await?;
        codec::decode(&node.data, what)
    }

    async fn try_read<T: DeserializeOwned>(
        &self,
        path: &str,
        what: &'static str,
    ) -> Result<Option<T>, TopologyError> {
        match self.store.get(path).await {
            Ok(node) => Ok(Some(codec::decode(&node.data, what)?)),
            Err(StoreError::NoNode { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_uuid_children(names: &[String]) -> Vec<Uuid> {
    names
        .iter()
        .filter_map(|name| Uuid::parse_str(name).ok())
        .collect()
}
