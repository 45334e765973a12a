//! Domain layer
//!
//! Each component holds a cloned [`GraphStore`](crate::graph::GraphStore)
//! handle and scopes every operation in one store transaction.

pub mod goals;
pub mod paths;
pub mod skills;
pub mod users;
