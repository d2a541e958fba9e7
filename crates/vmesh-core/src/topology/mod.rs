//! Transactional topology mutation.
//!
//! [`ops`] holds the pure op builders (mutation intent → ordered
//! [`StoreOp`](vmesh_store::StoreOp) list), [`keys`] the tunnel-key
//! allocator, and [`mutator`] the [`TopologyManager`](mutator::TopologyManager)
//! that applies op lists atomically and orchestrates multi-entity
//! operations.

pub mod keys;
pub mod mutator;
pub mod ops;
