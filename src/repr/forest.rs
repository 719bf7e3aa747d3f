//! Canonical forest representation (collection of partition trees).

use ndarray::ArrayView1;

use super::{tree::TreeValidationError, NodeId, Tree};
use crate::partition::LeafOracle;

/// Structural validation errors for [`Forest`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ForestValidationError {
    #[error("forest has no trees")]
    NoTrees,

    #[error("tree {tree_idx} splits on feature {feature} but samples have {n_features} features")]
    FeatureOutOfRange {
        tree_idx: usize,
        feature: u32,
        n_features: usize,
    },

    #[error("tree {tree_idx}: {error}")]
    InvalidTree {
        tree_idx: usize,
        error: TreeValidationError,
    },
}

/// Forest of partition trees.
///
/// Each tree assigns every sample to exactly one leaf; leaf ids are the node
/// ids of the leaf nodes, so they are unique within a tree but not across
/// trees. Every tree held by a forest has passed [`Tree::validate`], so
/// traversal always ends in a leaf.
#[derive(Debug, Clone, Default)]
pub struct Forest {
    trees: Vec<Tree>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a forest from already built trees.
    ///
    /// # Errors
    ///
    /// [`ForestValidationError`] if there are no trees or any tree is
    /// structurally invalid.
    pub fn from_trees(trees: Vec<Tree>) -> Result<Self, ForestValidationError> {
        let forest = Self { trees };
        forest.validate(None)?;
        Ok(forest)
    }

    /// Validate a tree and add it to the forest.
    pub fn push_tree(&mut self, tree: Tree) -> Result<(), ForestValidationError> {
        tree.validate().map_err(|error| ForestValidationError::InvalidTree {
            tree_idx: self.trees.len(),
            error,
        })?;
        self.trees.push(tree);
        Ok(())
    }

    /// Number of trees.
    #[inline]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Get a reference to a specific tree.
    #[inline]
    pub fn tree(&self, idx: usize) -> &Tree {
        &self.trees[idx]
    }

    /// Iterate over all trees.
    pub fn trees(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Total number of leaves across all trees.
    pub fn n_leaves(&self) -> usize {
        self.trees.iter().map(Tree::n_leaves).sum()
    }

    /// Validate every tree, and optionally that splits only reference
    /// features `< n_features`.
    pub fn validate(&self, n_features: Option<usize>) -> Result<(), ForestValidationError> {
        if self.trees.is_empty() {
            return Err(ForestValidationError::NoTrees);
        }

        for (tree_idx, tree) in self.trees.iter().enumerate() {
            tree.validate()
                .map_err(|error| ForestValidationError::InvalidTree { tree_idx, error })?;

            if let (Some(n_features), Some(feature)) = (n_features, tree.max_feature()) {
                if feature as usize >= n_features {
                    return Err(ForestValidationError::FeatureOutOfRange {
                        tree_idx,
                        feature,
                        n_features,
                    });
                }
            }
        }

        Ok(())
    }
}

impl LeafOracle for Forest {
    #[inline]
    fn n_trees(&self) -> usize {
        self.trees.len()
    }

    #[inline]
    fn leaf_id(&self, sample: ArrayView1<'_, f64>, tree: usize) -> NodeId {
        self.trees[tree].leaf_for_row(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition_tree;
    use crate::repr::NodeSpec;
    use ndarray::array;

    fn stump(feature: u32, threshold: f64) -> Tree {
        partition_tree! {
            0 => split(feature, threshold, L) -> 1, 2,
            1 => leaf,
            2 => leaf,
        }
    }

    #[test]
    fn oracle_routes_per_tree() {
        let forest = Forest::from_trees(vec![stump(0, 0.5), stump(1, 10.0)]).unwrap();
        let sample = array![1.0, 3.0];
        assert_eq!(LeafOracle::n_trees(&forest), 2);
        assert_eq!(forest.leaf_id(sample.view(), 0), 2);
        assert_eq!(forest.leaf_id(sample.view(), 1), 1);
        assert_eq!(forest.n_leaves(), 4);
    }

    #[test]
    fn from_trees_rejects_invalid_trees() {
        assert_eq!(
            Forest::from_trees(vec![]).unwrap_err(),
            ForestValidationError::NoTrees
        );
        assert_eq!(
            Forest::from_trees(vec![stump(0, 0.5), Tree::from_nodes(&[])]).unwrap_err(),
            ForestValidationError::InvalidTree {
                tree_idx: 1,
                error: TreeValidationError::EmptyTree
            }
        );

        // 0 -> 1 -> 0
        let cyclic = Tree::from_nodes(&[
            NodeSpec::Split { feature: 0, threshold: 0.5, left: 1, right: 2, default_left: true },
            NodeSpec::Split { feature: 0, threshold: 0.2, left: 0, right: 2, default_left: true },
            NodeSpec::Leaf,
        ]);
        assert!(matches!(
            Forest::from_trees(vec![cyclic]),
            Err(ForestValidationError::InvalidTree {
                tree_idx: 0,
                error: TreeValidationError::CycleDetected { .. } | TreeValidationError::DuplicateVisit { .. }
            })
        ));
    }

    #[test]
    fn push_tree_validates() {
        let mut forest = Forest::new();
        assert_eq!(forest.validate(None), Err(ForestValidationError::NoTrees));

        forest.push_tree(stump(0, 0.5)).unwrap();
        assert_eq!(
            forest.push_tree(Tree::from_nodes(&[])),
            Err(ForestValidationError::InvalidTree {
                tree_idx: 1,
                error: TreeValidationError::EmptyTree
            })
        );
        assert_eq!(forest.n_trees(), 1);
        assert_eq!(forest.validate(None), Ok(()));
    }

    #[test]
    fn validate_checks_feature_range() {
        let forest = Forest::from_trees(vec![stump(0, 0.5), stump(3, 1.0)]).unwrap();
        assert_eq!(forest.validate(Some(4)), Ok(()));
        assert_eq!(
            forest.validate(Some(2)),
            Err(ForestValidationError::FeatureOutOfRange {
                tree_idx: 1,
                feature: 3,
                n_features: 2
            })
        );
    }
}
