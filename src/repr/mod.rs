//! Partition forest representation.
//!
//! The partitioning ensemble is trained elsewhere; stratx only needs to know
//! which leaf every sample lands in. [`Tree`] stores the split structure of one
//! tree in SoA form and [`Forest`] groups trees into an ensemble that
//! implements [`LeafOracle`](crate::partition::LeafOracle).

/// Canonical node identifier.
///
/// Internally this is just an index into the tree's SoA arrays. Leaf ids handed
/// out by the oracle are node ids of leaf nodes.
pub type NodeId = u32;

pub mod forest;
pub mod tree;

pub use forest::{Forest, ForestValidationError};
pub use tree::{NodeSpec, Tree, TreeValidationError};
