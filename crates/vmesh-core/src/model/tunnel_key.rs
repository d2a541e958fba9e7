use serde::{Deserialize, Serialize};

use crate::model::BridgeId;

/// Stored record of one tunnel-key allocation.
///
/// `owner` is the back-reference to the bridge bound to this key; `None`
/// while the key is allocated but not yet bound (the window inside
/// bridge creation) or after the owner was deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelKeyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<BridgeId>,
}
