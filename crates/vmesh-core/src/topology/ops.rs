// ── Topology op builders ──
//
// Pure translation from an intended mutation to the ordered op list
// that, applied atomically, leaves every invariant intact. Builders do
// no I/O: anything that needs enumeration (a bridge's current ports, a
// peer's current config) is read by the mutator and passed in.
//
// Ordering rules encoded here:
//   - peer back-references are cleared before the nodes they point at
//     are deleted, so a transaction never contains a SetData on a
//     deleted node;
//   - index entries are removed before their container node;
//   - tunnel-key release is never part of a delete list — it is a
//     separate call after the deleting transaction is confirmed, so key
//     reuse cannot race ahead of it.

use vmesh_store::StoreOp;

use crate::codec;
use crate::error::TopologyError;
use crate::model::{
    BridgeConfig, BridgeId, PortAdminConfig, PortConfig, PortId, TenantConfig, TenantId,
    TunnelKeyConfig,
};
use crate::paths::PathBuilder;

/// Everything the bridge-delete builder needs to know about one owned
/// port. `peer` is populated only when the port is linked to a port
/// OUTSIDE the delete set (an internal pair needs no unlink — both ends
/// vanish in the same transaction).
#[derive(Debug, Clone)]
pub struct PortDeletion {
    pub id: PortId,
    pub dataplane: Option<PortConfig>,
    pub peer: Option<(PortId, PortConfig)>,
    pub has_admin: bool,
}

/// Ops creating a tenant record plus its empty bridge index.
pub fn tenant_create(
    paths: &PathBuilder,
    tenant_id: &TenantId,
    config: &TenantConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    Ok(vec![
        StoreOp::create(paths.tenant(tenant_id), codec::encode(config, "TenantConfig")?),
        StoreOp::create(paths.tenant_bridges(tenant_id), Vec::new()),
    ])
}

/// Ops deleting a tenant. The bridge index must already be empty; a
/// populated index fails the transaction, forcing bridges to be deleted
/// first.
pub fn tenant_delete(paths: &PathBuilder, tenant_id: &TenantId) -> Vec<StoreOp> {
    vec![
        StoreOp::delete(paths.tenant_bridges(tenant_id)),
        StoreOp::delete(paths.tenant(tenant_id)),
    ]
}

/// Ops creating a bridge: the bridge node, its tenant-index entry, an
/// empty ports index, and the tunnel key's owner back-reference — all in
/// one transaction, so the key and the bridge can never disagree.
pub fn bridge_create(
    paths: &PathBuilder,
    id: BridgeId,
    config: &BridgeConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    let owner = TunnelKeyConfig { owner: Some(id) };
    Ok(vec![
        StoreOp::create(paths.bridge(id), codec::encode(config, "BridgeConfig")?),
        StoreOp::create(paths.tenant_bridge(&config.tenant_id, id), Vec::new()),
        StoreOp::create(paths.bridge_ports(id), Vec::new()),
        StoreOp::set_data(
            paths.tunnel_key(config.tunnel_key),
            codec::encode(&owner, "TunnelKeyConfig")?,
        ),
    ])
}

/// Ops deleting a bridge and (per `cascade`) its owned ports.
///
/// cascade=false removes the management-facing port records and the
/// bridge's own index entries but leaves dataplane port nodes intact —
/// the bridge's disappearance alone does not imply the dataplane side
/// vanishes. cascade=true removes both layers, unlinking any peer
/// outside the delete set first. The tunnel key's owner reference is
/// cleared; the key itself is released by a separate call.
pub fn bridge_delete(
    paths: &PathBuilder,
    id: BridgeId,
    config: &BridgeConfig,
    ports: &[PortDeletion],
    cascade: bool,
) -> Result<Vec<StoreOp>, TopologyError> {
    let mut ops = Vec::new();

    // Unlinks first: every SetData must land before its target could be
    // deleted later in the list.
    if cascade {
        for port in ports {
            if port.dataplane.is_none() {
                continue;
            }
            if let Some((peer_id, peer_config)) = &port.peer {
                let mut cleared = peer_config.clone();
                cleared.peer_id = None;
                ops.push(StoreOp::set_data(
                    paths.port(*peer_id),
                    codec::encode(&cleared, "PortConfig")?,
                ));
            }
        }
    }

    for port in ports {
        ops.push(StoreOp::delete(paths.bridge_port(id, port.id)));
        if cascade && port.dataplane.is_some() {
            ops.push(StoreOp::delete(paths.port(port.id)));
        }
        if port.has_admin {
            ops.push(StoreOp::delete(paths.port_admin(port.id)));
        }
    }

    ops.push(StoreOp::delete(paths.bridge_ports(id)));
    ops.push(StoreOp::delete(paths.tenant_bridge(&config.tenant_id, id)));
    ops.push(StoreOp::delete(paths.bridge(id)));

    let unbound = TunnelKeyConfig { owner: None };
    ops.push(StoreOp::set_data(
        paths.tunnel_key(config.tunnel_key),
        codec::encode(&unbound, "TunnelKeyConfig")?,
    ));
    Ok(ops)
}

/// Ops creating a port: admin record, dataplane record, and the owning
/// bridge's index entry.
pub fn port_create(
    paths: &PathBuilder,
    id: PortId,
    config: &PortConfig,
    admin: &PortAdminConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    Ok(vec![
        StoreOp::create(paths.port_admin(id), codec::encode(admin, "PortAdminConfig")?),
        StoreOp::create(paths.port(id), codec::encode(config, "PortConfig")?),
        StoreOp::create(paths.bridge_port(config.bridge_id, id), Vec::new()),
    ])
}

/// Ops deleting a single port.
///
/// cascade=true removes the dataplane record (unlinking a live peer
/// first) and the bridge index entry; cascade=false removes only the
/// management-facing record. Either way the op list only touches records
/// that actually exist — the mutator passes in what it found.
pub fn port_delete(
    paths: &PathBuilder,
    id: PortId,
    dataplane: Option<&PortConfig>,
    peer: Option<(PortId, &PortConfig)>,
    has_admin: bool,
    cascade: bool,
) -> Result<Vec<StoreOp>, TopologyError> {
    let mut ops = Vec::new();
    if cascade {
        if let Some(config) = dataplane {
            if let Some((peer_id, peer_config)) = peer {
                let mut cleared = peer_config.clone();
                cleared.peer_id = None;
                ops.push(StoreOp::set_data(
                    paths.port(peer_id),
                    codec::encode(&cleared, "PortConfig")?,
                ));
            }
            ops.push(StoreOp::delete(paths.bridge_port(config.bridge_id, id)));
            ops.push(StoreOp::delete(paths.port(id)));
        }
    }
    if has_admin {
        ops.push(StoreOp::delete(paths.port_admin(id)));
    }
    Ok(ops)
}

/// Ops linking two ports: both peer fields are set in one transaction —
/// either both land or neither does.
pub fn link_create(
    paths: &PathBuilder,
    id: PortId,
    config: &PortConfig,
    peer_id: PortId,
    peer_config: &PortConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    let mut near = config.clone();
    near.peer_id = Some(peer_id);
    let mut far = peer_config.clone();
    far.peer_id = Some(id);
    Ok(vec![
        StoreOp::set_data(paths.port(id), codec::encode(&near, "PortConfig")?),
        StoreOp::set_data(paths.port(peer_id), codec::encode(&far, "PortConfig")?),
    ])
}

/// Ops tearing a link down: both peer fields cleared together.
pub fn link_delete(
    paths: &PathBuilder,
    id: PortId,
    config: &PortConfig,
    peer_id: PortId,
    peer_config: &PortConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    let mut near = config.clone();
    near.peer_id = None;
    let mut far = peer_config.clone();
    far.peer_id = None;
    Ok(vec![
        StoreOp::set_data(paths.port(id), codec::encode(&near, "PortConfig")?),
        StoreOp::set_data(paths.port(peer_id), codec::encode(&far, "PortConfig")?),
    ])
}

/// Op updating a port's management record (VIF plug/unplug).
pub fn port_admin_update(
    paths: &PathBuilder,
    id: PortId,
    admin: &PortAdminConfig,
) -> Result<Vec<StoreOp>, TopologyError> {
    Ok(vec![StoreOp::set_data(
        paths.port_admin(id),
        codec::encode(admin, "PortAdminConfig")?,
    )])
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn paths() -> PathBuilder {
        PathBuilder::default()
    }

    fn bridge_config(tenant: &str, key: u64) -> BridgeConfig {
        BridgeConfig {
            name: "br0".into(),
            tenant_id: tenant.into(),
            tunnel_key: key,
        }
    }

    #[test]
    fn tenant_create_builds_record_then_index() {
        let p = paths();
        let ops = tenant_create(&p, &"acme".to_owned(), &TenantConfig::default()).unwrap();
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].path(), p.tenant(&"acme".to_owned()));
        assert_eq!(ops[1].path(), p.tenant_bridges(&"acme".to_owned()));
    }

    #[test]
    fn tenant_delete_removes_index_before_record() {
        let p = paths();
        let ops = tenant_delete(&p, &"acme".to_owned());
        assert_eq!(ops[0].path(), p.tenant_bridges(&"acme".to_owned()));
        assert_eq!(ops[1].path(), p.tenant(&"acme".to_owned()));
    }

    #[test]
    fn bridge_create_binds_key_in_same_transaction() {
        let p = paths();
        let id = Uuid::new_v4();
        let config = bridge_config("acme", 5);
        let ops = bridge_create(&p, id, &config).unwrap();

        let op_paths: Vec<&str> = ops.iter().map(StoreOp::path).collect();
        assert_eq!(
            op_paths,
            vec![
                p.bridge(id),
                p.tenant_bridge(&"acme".to_owned(), id),
                p.bridge_ports(id),
                p.tunnel_key(5),
            ]
        );
        // The key bind is a SetData carrying the owner back-reference.
        let StoreOp::SetData { data, .. } = &ops[3] else {
            panic!("expected SetData for the key bind");
        };
        let owner: TunnelKeyConfig = serde_json::from_slice(data).unwrap();
        assert_eq!(owner.owner, Some(id));
    }

    #[test]
    fn port_delete_without_cascade_touches_only_admin_record() {
        let p = paths();
        let id = Uuid::new_v4();
        let config = PortConfig::new(Uuid::new_v4());
        let ops = port_delete(&p, id, Some(&config), None, true, false).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].path(), p.port_admin(id));
    }

    #[test]
    fn port_delete_with_cascade_unlinks_peer_first() {
        let p = paths();
        let bridge = Uuid::new_v4();
        let id = Uuid::new_v4();
        let peer_id = Uuid::new_v4();

        let mut config = PortConfig::new(bridge);
        config.peer_id = Some(peer_id);
        let mut peer_config = PortConfig::new(bridge);
        peer_config.peer_id = Some(id);

        let ops = port_delete(
            &p,
            id,
            Some(&config),
            Some((peer_id, &peer_config)),
            true,
            true,
        )
        .unwrap();

        // Unlink, index entry, dataplane record, admin record.
        assert_eq!(ops[0].path(), p.port(peer_id));
        assert!(matches!(&ops[0], StoreOp::SetData { data, .. }
            if serde_json::from_slice::<PortConfig>(data).unwrap().peer_id.is_none()));
        assert_eq!(ops[1].path(), p.bridge_port(bridge, id));
        assert_eq!(ops[2].path(), p.port(id));
        assert_eq!(ops[3].path(), p.port_admin(id));
    }

    #[test]
    fn link_create_sets_both_peer_fields() {
        let p = paths();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let a_cfg = PortConfig::new(Uuid::new_v4());
        let b_cfg = PortConfig::new(Uuid::new_v4());

        let ops = link_create(&p, a, &a_cfg, b, &b_cfg).unwrap();
        assert_eq!(ops.len(), 2);
        let StoreOp::SetData { data, .. } = &ops[0] else {
            panic!("expected SetData");
        };
        assert_eq!(
            serde_json::from_slice::<PortConfig>(data).unwrap().peer_id,
            Some(b)
        );
        let StoreOp::SetData { data, .. } = &ops[1] else {
            panic!("expected SetData");
        };
        assert_eq!(
            serde_json::from_slice::<PortConfig>(data).unwrap().peer_id,
            Some(a)
        );
    }

    #[test]
    fn bridge_delete_clears_key_owner_last() {
        let p = paths();
        let id = Uuid::new_v4();
        let config = bridge_config("acme", 9);
        let ops = bridge_delete(&p, id, &config, &[], false).unwrap();

        let last = ops.last().unwrap();
        assert_eq!(last.path(), p.tunnel_key(9));
        let StoreOp::SetData { data, .. } = last else {
            panic!("expected SetData clearing the owner");
        };
        let key: TunnelKeyConfig = serde_json::from_slice(data).unwrap();
        assert_eq!(key.owner, None);
        // No op in the list releases the key itself.
        assert!(ops.iter().all(|op| op.path() != p.tunnel_key_free(9)));
    }

    #[test]
    fn bridge_delete_cascade_false_leaves_dataplane_ports() {
        let p = paths();
        let id = Uuid::new_v4();
        let port_id = Uuid::new_v4();
        let config = bridge_config("acme", 2);
        let ports = vec![PortDeletion {
            id: port_id,
            dataplane: Some(PortConfig::new(id)),
            peer: None,
            has_admin: true,
        }];

        let ops = bridge_delete(&p, id, &config, &ports, false).unwrap();
        assert!(ops.iter().all(|op| op.path() != p.port(port_id)));
        assert!(ops.iter().any(|op| op.path() == p.port_admin(port_id)));
        assert!(ops.iter().any(|op| op.path() == p.bridge_port(id, port_id)));
    }

    #[test]
    fn bridge_delete_cascade_true_removes_both_layers() {
        let p = paths();
        let id = Uuid::new_v4();
        let port_id = Uuid::new_v4();
        let config = bridge_config("acme", 2);
        let ports = vec![PortDeletion {
            id: port_id,
            dataplane: Some(PortConfig::new(id)),
            peer: None,
            has_admin: true,
        }];

        let ops = bridge_delete(&p, id, &config, &ports, true).unwrap();
        assert!(ops.iter().any(|op| op.path() == p.port(port_id)));
        assert!(ops.iter().any(|op| op.path() == p.port_admin(port_id)));
    }
}
