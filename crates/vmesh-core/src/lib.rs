//! Topology layer of the vmesh control plane.
//!
//! This crate owns the logical topology graph — tenants, bridges, ports,
//! port-links, tunnel-key allocations — persisted in the coordination
//! store, and the bookkeeping for per-host command queues:
//!
//! - **[`TopologyManager`]** — the transactional mutator. Every
//!   administrative mutation is built as an ordered op list by the pure
//!   builders in [`topology::ops`] and applied as one atomic store
//!   transaction, so cross-entity invariants (tunnel-key back-references,
//!   link symmetry, cascading deletes) are never observable half-done.
//!
//! - **[`TunnelKeyAllocator`]** — race-safe allocation of the small
//!   integer identifying a bridge's tunneling domain. Freed keys are
//!   parked in a free set and reclaimed before fresh ones are minted.
//!
//! - **[`HostManager`]** — the per-host command queue view: sequential
//!   command posting, enumeration with one-shot watch re-arm, error-log
//!   write-back, and execution completion markers.
//!
//! - **Domain model** ([`model`]) — the stored configuration records
//!   ([`BridgeConfig`], [`PortConfig`], [`HostCommand`], ...) and
//!   [`paths::PathBuilder`], the node layout under the store root.
//!
//! The store itself is abstract: everything is generic over
//! `S: vmesh_store::ConfigStore`.

pub mod error;
pub mod host;
pub mod model;
pub mod paths;
pub mod topology;

pub(crate) mod codec;

pub use error::TopologyError;
pub use host::HostManager;
pub use paths::PathBuilder;
pub use topology::keys::TunnelKeyAllocator;
pub use topology::mutator::{NewPort, TopologyManager};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    BridgeConfig, BridgeId, CommandId, ErrorLogEntry, HostCommand, HostId, PortAdminConfig,
    PortConfig, PortId, TenantConfig, TenantId, TunnelKey, TunnelKeyConfig,
};
