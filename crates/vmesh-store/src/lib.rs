//! Coordination-store client layer for vmesh.
//!
//! All persisted vmesh state — topology, tunnel-key allocations, per-host
//! command queues — lives in a hierarchical, versioned coordination
//! service. This crate defines the contract consumed by the rest of the
//! workspace and ships an in-process reference backend:
//!
//! - **[`ConfigStore`]** — the service contract: node create/read/update/
//!   delete with attached payloads, atomic multi-op transactions
//!   ([`StoreOp`]), child enumeration, and one-shot child watches
//!   ([`ChildWatch`]).
//!
//! - **[`MemoryStore`]** — a complete in-memory implementation of the
//!   contract used by tests and local development. The production backend
//!   is an external coordination service and is deliberately out of scope
//!   here; only its semantics are pinned down.
//!
//! - **[`StoreError`]** — the failure taxonomy. `vmesh-core` translates
//!   these into domain-level errors.

pub mod error;
pub mod memory;
pub mod ops;
pub mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use ops::StoreOp;
pub use store::{ChildWatch, ConfigStore, NodeData, WatchEvent};
