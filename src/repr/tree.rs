//! SoA split tree.
//!
//! Each node is either a numeric split (`value < threshold` goes left, NaN
//! follows the default direction) or a leaf. Leaf values are irrelevant to
//! stratification, only leaf identity matters, so none are stored.

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use super::NodeId;

/// Serializable description of one node.
///
/// In JSON a leaf is the string `"leaf"` and a split is
/// `{"split": {"feature": 0, "threshold": 1.5, "left": 1, "right": 2}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSpec {
    Split {
        feature: u32,
        threshold: f64,
        left: NodeId,
        right: NodeId,
        #[serde(default = "default_left")]
        default_left: bool,
    },
    Leaf,
}

fn default_left() -> bool {
    true
}

/// Structural validation errors for [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeValidationError {
    #[error("tree has no nodes")]
    EmptyTree,

    #[error("node {node}: {side} child {child} out of bounds ({n_nodes} nodes)")]
    ChildOutOfBounds {
        node: NodeId,
        side: &'static str,
        child: NodeId,
        n_nodes: usize,
    },

    #[error("node {node} references itself as a child")]
    SelfLoop { node: NodeId },

    #[error("node {node} reached by more than one path")]
    DuplicateVisit { node: NodeId },

    #[error("cycle detected at node {node}")]
    CycleDetected { node: NodeId },

    #[error("node {node} is unreachable from the root")]
    UnreachableNode { node: NodeId },
}

/// Structure-of-Arrays tree storage.
///
/// Child indices are local to this tree (0 = root).
#[derive(Debug, Clone)]
pub struct Tree {
    split_indices: Box<[u32]>,
    split_thresholds: Box<[f64]>,
    left_children: Box<[NodeId]>,
    right_children: Box<[NodeId]>,
    default_left: Box<[bool]>,
    is_leaf: Box<[bool]>,
}

impl Tree {
    /// Create a tree from parallel arrays.
    ///
    /// All arrays must have the same length (number of nodes). Entries for
    /// leaf nodes in the split arrays are ignored.
    pub fn new(
        split_indices: Vec<u32>,
        split_thresholds: Vec<f64>,
        left_children: Vec<NodeId>,
        right_children: Vec<NodeId>,
        default_left: Vec<bool>,
        is_leaf: Vec<bool>,
    ) -> Self {
        let num_nodes = split_indices.len();
        debug_assert_eq!(num_nodes, split_thresholds.len());
        debug_assert_eq!(num_nodes, left_children.len());
        debug_assert_eq!(num_nodes, right_children.len());
        debug_assert_eq!(num_nodes, default_left.len());
        debug_assert_eq!(num_nodes, is_leaf.len());

        Self {
            split_indices: split_indices.into_boxed_slice(),
            split_thresholds: split_thresholds.into_boxed_slice(),
            left_children: left_children.into_boxed_slice(),
            right_children: right_children.into_boxed_slice(),
            default_left: default_left.into_boxed_slice(),
            is_leaf: is_leaf.into_boxed_slice(),
        }
    }

    /// Build from node descriptions, node `i` at position `i`.
    pub fn from_nodes(nodes: &[NodeSpec]) -> Self {
        let n = nodes.len();
        let mut split_indices = Vec::with_capacity(n);
        let mut split_thresholds = Vec::with_capacity(n);
        let mut left_children = Vec::with_capacity(n);
        let mut right_children = Vec::with_capacity(n);
        let mut default_lefts = Vec::with_capacity(n);
        let mut is_leaf = Vec::with_capacity(n);

        for node in nodes {
            match *node {
                NodeSpec::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    split_indices.push(feature);
                    split_thresholds.push(threshold);
                    left_children.push(left);
                    right_children.push(right);
                    default_lefts.push(default_left);
                    is_leaf.push(false);
                }
                NodeSpec::Leaf => {
                    split_indices.push(0);
                    split_thresholds.push(0.0);
                    left_children.push(0);
                    right_children.push(0);
                    default_lefts.push(true);
                    is_leaf.push(true);
                }
            }
        }

        Self::new(
            split_indices,
            split_thresholds,
            left_children,
            right_children,
            default_lefts,
            is_leaf,
        )
    }

    /// Node descriptions, inverse of [`Tree::from_nodes`].
    pub fn to_nodes(&self) -> Vec<NodeSpec> {
        (0..self.n_nodes() as NodeId)
            .map(|node| {
                if self.is_leaf(node) {
                    NodeSpec::Leaf
                } else {
                    NodeSpec::Split {
                        feature: self.split_index(node),
                        threshold: self.split_threshold(node),
                        left: self.left_child(node),
                        right: self.right_child(node),
                        default_left: self.default_left(node),
                    }
                }
            })
            .collect()
    }

    /// Number of nodes in this tree.
    #[inline]
    pub fn n_nodes(&self) -> usize {
        self.is_leaf.len()
    }

    /// Number of leaf nodes.
    pub fn n_leaves(&self) -> usize {
        self.is_leaf.iter().filter(|&&l| l).count()
    }

    #[inline]
    pub fn is_leaf(&self, node_idx: NodeId) -> bool {
        self.is_leaf[node_idx as usize]
    }

    #[inline]
    pub fn split_index(&self, node_idx: NodeId) -> u32 {
        self.split_indices[node_idx as usize]
    }

    #[inline]
    pub fn split_threshold(&self, node_idx: NodeId) -> f64 {
        self.split_thresholds[node_idx as usize]
    }

    #[inline]
    pub fn left_child(&self, node_idx: NodeId) -> NodeId {
        self.left_children[node_idx as usize]
    }

    #[inline]
    pub fn right_child(&self, node_idx: NodeId) -> NodeId {
        self.right_children[node_idx as usize]
    }

    /// Direction taken by missing values.
    #[inline]
    pub fn default_left(&self, node_idx: NodeId) -> bool {
        self.default_left[node_idx as usize]
    }

    /// Highest split feature index, if the tree has splits.
    pub fn max_feature(&self) -> Option<u32> {
        (0..self.n_nodes() as NodeId)
            .filter(|&n| !self.is_leaf(n))
            .map(|n| self.split_index(n))
            .max()
    }

    /// Traverse the tree and return the id of the leaf `row` lands in.
    ///
    /// Features beyond the end of `row` read as missing.
    pub fn leaf_for_row(&self, row: ArrayView1<'_, f64>) -> NodeId {
        let mut idx: NodeId = 0;

        while !self.is_leaf(idx) {
            let feat_idx = self.split_index(idx) as usize;
            let fvalue = row.get(feat_idx).copied().unwrap_or(f64::NAN);

            idx = if fvalue.is_nan() {
                if self.default_left(idx) {
                    self.left_child(idx)
                } else {
                    self.right_child(idx)
                }
            } else if fvalue < self.split_threshold(idx) {
                self.left_child(idx)
            } else {
                self.right_child(idx)
            };
        }

        idx
    }

    /// Validate basic structural invariants for this tree.
    ///
    /// A tree that passes is a proper binary tree rooted at node 0, so
    /// [`Tree::leaf_for_row`] always terminates.
    pub fn validate(&self) -> Result<(), TreeValidationError> {
        let n_nodes = self.n_nodes();
        if n_nodes == 0 {
            return Err(TreeValidationError::EmptyTree);
        }

        // Iterative DFS with color marking.
        // 0 = unvisited, 1 = visiting, 2 = done
        let mut color = vec![0u8; n_nodes];
        let mut stack: Vec<(NodeId, bool)> = vec![(0, false)];

        while let Some((node, finished)) = stack.pop() {
            let node_usize = node as usize;

            if finished {
                color[node_usize] = 2;
                continue;
            }

            match color[node_usize] {
                1 => return Err(TreeValidationError::CycleDetected { node }),
                2 => return Err(TreeValidationError::DuplicateVisit { node }),
                _ => {}
            }

            color[node_usize] = 1;
            stack.push((node, true));

            if self.is_leaf(node) {
                continue;
            }

            let left = self.left_child(node);
            let right = self.right_child(node);

            if left == node || right == node {
                return Err(TreeValidationError::SelfLoop { node });
            }
            for (side, child) in [("left", left), ("right", right)] {
                if child as usize >= n_nodes {
                    return Err(TreeValidationError::ChildOutOfBounds {
                        node,
                        side,
                        child,
                        n_nodes,
                    });
                }
            }

            stack.push((right, false));
            stack.push((left, false));
        }

        if let Some(i) = color.iter().position(|&c| c == 0) {
            return Err(TreeValidationError::UnreachableNode { node: i as NodeId });
        }

        Ok(())
    }
}

/// Build a [`Tree`] from a compact node listing.
///
/// Node ids must be listed in order starting at 0. `L`/`R` is the direction
/// missing values take at a split.
///
/// ```
/// let tree = stratx::partition_tree! {
///     0 => split(0, 0.5, L) -> 1, 2,
///     1 => leaf,
///     2 => leaf,
/// };
/// assert_eq!(tree.n_leaves(), 2);
/// ```
#[macro_export]
macro_rules! partition_tree {
    (@node leaf) => {
        $crate::repr::NodeSpec::Leaf
    };
    (@node split ($feat:expr, $thr:expr, L) -> $left:expr, $right:expr) => {
        $crate::repr::NodeSpec::Split {
            feature: $feat,
            threshold: $thr,
            left: $left,
            right: $right,
            default_left: true,
        }
    };
    (@node split ($feat:expr, $thr:expr, R) -> $left:expr, $right:expr) => {
        $crate::repr::NodeSpec::Split {
            feature: $feat,
            threshold: $thr,
            left: $left,
            right: $right,
            default_left: false,
        }
    };
    ($($id:literal => $kind:ident $(($feat:expr, $thr:expr, $dir:ident) -> $left:expr, $right:expr)?),+ $(,)?) => {{
        let mut nodes: ::std::vec::Vec<$crate::repr::NodeSpec> = ::std::vec::Vec::new();
        $(
            debug_assert_eq!($id as usize, nodes.len(), "node ids must be listed in order");
            nodes.push($crate::partition_tree!(@node $kind $(($feat, $thr, $dir) -> $left, $right)?));
        )+
        $crate::repr::Tree::from_nodes(&nodes)
    }};
}
