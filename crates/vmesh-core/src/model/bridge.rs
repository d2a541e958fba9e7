use serde::{Deserialize, Serialize};

use crate::model::{TenantId, TunnelKey};

/// Stored configuration of a virtual bridge.
///
/// The tunnel key is allocated at creation and owned exclusively for the
/// bridge's lifetime; the key node carries the reverse reference and the
/// two always agree (both sides are written in the same transaction).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    pub name: String,
    pub tenant_id: TenantId,
    pub tunnel_key: TunnelKey,
}
