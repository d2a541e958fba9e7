use serde::{Deserialize, Serialize};

/// Stored tenant record. Bridges are tracked as an index of child nodes,
/// not in the payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
