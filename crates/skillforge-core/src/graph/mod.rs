//! Property graph store
//!
//! A transactional store of labelled nodes and typed, directed edges with
//! JSON properties. This is the only module that issues SQL against the
//! graph tables; everything above it works with [`NodeRecord`]s and typed
//! domain structs.

pub mod record;
pub mod store;

pub use record::{Direction, EdgeRecord, EdgeType, Neighbor, NodeLabel, NodeRecord};
pub use store::{GraphStore, GraphTransaction};
