use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{BridgeId, PortId};

/// Dataplane-facing port record.
///
/// `peer_id` forms a symmetric link: if A's peer is B, B's peer is A.
/// Both sides are always set or cleared in one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub bridge_id: BridgeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound_filter: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound_filter: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PortId>,
}

impl PortConfig {
    pub fn new(bridge_id: BridgeId) -> Self {
        Self {
            bridge_id,
            inbound_filter: None,
            outbound_filter: None,
            peer_id: None,
        }
    }
}

/// Management-facing port record, deletable independently of the
/// dataplane record (the two layers are torn down by different actors).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortAdminConfig {
    /// Attached VIF, if the port is plugged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vif_id: Option<Uuid>,
}
