// ── Node path layout ──
//
// Every persisted record lives under a configurable root prefix:
//
//   <root>/mgmt/tenants/<tenantId>                 TenantConfig
//   <root>/mgmt/tenants/<tenantId>/bridges/<bId>   (index, empty)
//   <root>/mgmt/ports/<portId>                     PortAdminConfig
//   <root>/topo/bridges/<bridgeId>                 BridgeConfig
//   <root>/topo/bridges/<bridgeId>/ports/<portId>  (index, empty)
//   <root>/topo/ports/<portId>                     PortConfig
//   <root>/topo/tunnel-keys/key<seq>               TunnelKeyConfig
//   <root>/topo/tunnel-keys/free/<key>             (free-set marker)
//   <root>/hosts/<hostId>/commands/cmd<seq>        HostCommand
//   <root>/hosts/<hostId>/errors/<commandId>       ErrorLogEntry
//   <root>/hosts/<hostId>/executed/<commandId>     (completion marker)
//
// The mgmt subtree carries management-facing records that can be deleted
// independently of their dataplane-facing counterparts under topo.

use crate::model::{BridgeId, CommandId, HostId, PortId, TenantId, TunnelKey};

/// Default root prefix.
pub const DEFAULT_ROOT: &str = "/vmesh";

/// Name prefix for sequentially-minted tunnel-key nodes.
pub const TUNNEL_KEY_PREFIX: &str = "key";

/// Name prefix for sequentially-minted command nodes.
pub const COMMAND_PREFIX: &str = "cmd";

/// Render a sequential child name the way the store mints it.
pub fn seq_name(prefix: &str, seq: u64) -> String {
    format!("{prefix}{seq:010}")
}

/// Builds the absolute store paths for every vmesh record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathBuilder {
    root: String,
}

impl PathBuilder {
    /// Create a builder rooted at `root` (leading `/`, no trailing `/`).
    pub fn new(root: impl Into<String>) -> Self {
        let mut root = root.into();
        while root.len() > 1 && root.ends_with('/') {
            root.pop();
        }
        Self { root }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    // ── Management subtree ───────────────────────────────────────────

    pub fn tenants(&self) -> String {
        format!("{}/mgmt/tenants", self.root)
    }

    pub fn tenant(&self, tenant_id: &TenantId) -> String {
        format!("{}/{tenant_id}", self.tenants())
    }

    pub fn tenant_bridges(&self, tenant_id: &TenantId) -> String {
        format!("{}/bridges", self.tenant(tenant_id))
    }

    pub fn tenant_bridge(&self, tenant_id: &TenantId, bridge_id: BridgeId) -> String {
        format!("{}/{bridge_id}", self.tenant_bridges(tenant_id))
    }

    pub fn ports_admin(&self) -> String {
        format!("{}/mgmt/ports", self.root)
    }

    pub fn port_admin(&self, port_id: PortId) -> String {
        format!("{}/{port_id}", self.ports_admin())
    }

    // ── Dataplane subtree ────────────────────────────────────────────

    pub fn bridges(&self) -> String {
        format!("{}/topo/bridges", self.root)
    }

    pub fn bridge(&self, bridge_id: BridgeId) -> String {
        format!("{}/{bridge_id}", self.bridges())
    }

    pub fn bridge_ports(&self, bridge_id: BridgeId) -> String {
        format!("{}/ports", self.bridge(bridge_id))
    }

    pub fn bridge_port(&self, bridge_id: BridgeId, port_id: PortId) -> String {
        format!("{}/{port_id}", self.bridge_ports(bridge_id))
    }

    pub fn ports(&self) -> String {
        format!("{}/topo/ports", self.root)
    }

    pub fn port(&self, port_id: PortId) -> String {
        format!("{}/{port_id}", self.ports())
    }

    // ── Tunnel keys ──────────────────────────────────────────────────

    pub fn tunnel_keys(&self) -> String {
        format!("{}/topo/tunnel-keys", self.root)
    }

    pub fn tunnel_key(&self, key: TunnelKey) -> String {
        format!("{}/{}", self.tunnel_keys(), seq_name(TUNNEL_KEY_PREFIX, key))
    }

    pub fn tunnel_keys_free(&self) -> String {
        format!("{}/free", self.tunnel_keys())
    }

    pub fn tunnel_key_free(&self, key: TunnelKey) -> String {
        format!("{}/{key}", self.tunnel_keys_free())
    }

    // ── Hosts ────────────────────────────────────────────────────────

    pub fn hosts(&self) -> String {
        format!("{}/hosts", self.root)
    }

    pub fn host(&self, host_id: HostId) -> String {
        format!("{}/{host_id}", self.hosts())
    }

    pub fn host_commands(&self, host_id: HostId) -> String {
        format!("{}/commands", self.host(host_id))
    }

    pub fn host_command(&self, host_id: HostId, command_id: CommandId) -> String {
        format!(
            "{}/{}",
            self.host_commands(host_id),
            seq_name(COMMAND_PREFIX, command_id)
        )
    }

    pub fn host_errors(&self, host_id: HostId) -> String {
        format!("{}/errors", self.host(host_id))
    }

    pub fn host_error(&self, host_id: HostId, command_id: CommandId) -> String {
        format!("{}/{command_id:010}", self.host_errors(host_id))
    }

    pub fn host_executed(&self, host_id: HostId) -> String {
        format!("{}/executed", self.host(host_id))
    }

    pub fn host_executed_entry(&self, host_id: HostId, command_id: CommandId) -> String {
        format!("{}/{command_id:010}", self.host_executed(host_id))
    }

    // ── Base layout ──────────────────────────────────────────────────

    /// Every container node, parents first, for idempotent setup.
    pub fn base_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();

        // Ancestors of the root itself ("/a/b" needs "/a" first).
        let mut end = 0;
        while let Some(idx) = self.root[end + 1..].find('/') {
            end += idx + 1;
            paths.push(self.root[..end].to_owned());
        }
        paths.push(self.root.clone());

        paths.push(format!("{}/mgmt", self.root));
        paths.push(self.tenants());
        paths.push(self.ports_admin());
        paths.push(format!("{}/topo", self.root));
        paths.push(self.bridges());
        paths.push(self.ports());
        paths.push(self.tunnel_keys());
        paths.push(self.tunnel_keys_free());
        paths.push(self.hosts());
        paths
    }
}

impl Default for PathBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_ROOT)
    }
}
