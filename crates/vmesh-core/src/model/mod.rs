//! Stored configuration records and identifier types.
//!
//! Every record here is a store payload: plain data, serde round-trip,
//! no behavior. Cross-entity relationships (tunnel-key ownership, port
//! peering) are plain IDs kept consistent by the transactional mutator,
//! never in-memory object references.

pub mod bridge;
pub mod command;
pub mod port;
pub mod tenant;
pub mod tunnel_key;

pub use bridge::BridgeConfig;
pub use command::{ErrorLogEntry, HostCommand};
pub use port::{PortAdminConfig, PortConfig};
pub use tenant::TenantConfig;
pub use tunnel_key::TunnelKeyConfig;

use uuid::Uuid;

/// Opaque tenant identifier, assigned by the management layer.
pub type TenantId = String;

/// Generated unique bridge identifier.
pub type BridgeId = Uuid;

/// Generated unique port identifier.
pub type PortId = Uuid;

/// Identity of a host agent.
pub type HostId = Uuid;

/// Small positive integer identifying a bridge's tunneling domain.
pub type TunnelKey = u64;

/// Command identifier, scoped to one host's queue.
pub type CommandId = u64;
