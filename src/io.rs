//! JSON storage for partition forests.
//!
//! Trees trained by an external library can be exported once and loaded as a
//! [`Forest`] oracle:
//!
//! ```json
//! {
//!   "n_features": 2,
//!   "trees": [
//!     { "nodes": [
//!         { "split": { "feature": 0, "threshold": 0.5, "left": 1, "right": 2 } },
//!         "leaf",
//!         "leaf"
//!     ] }
//!   ]
//! }
//! ```
//!
//! `n_features` is optional; when present every split feature is checked
//! against it. Loaded forests are always structurally validated.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::repr::{Forest, ForestValidationError, NodeSpec, Tree};

/// Errors that can occur while loading a forest.
#[derive(Debug, Error)]
pub enum ForestLoadError {
    /// I/O error during reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON or unexpected layout.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Well-formed file describing an invalid forest.
    #[error("invalid forest: {0}")]
    Validation(#[from] ForestValidationError),
}

#[derive(Debug, Serialize, Deserialize)]
struct TreeDoc {
    nodes: Vec<NodeSpec>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ForestDoc {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    n_features: Option<usize>,
    trees: Vec<TreeDoc>,
}

impl Forest {
    /// Load and validate a forest from a JSON reader.
    pub fn from_json_reader<R: Read>(reader: R) -> Result<Self, ForestLoadError> {
        let doc: ForestDoc = serde_json::from_reader(reader)?;
        Self::from_doc(doc)
    }

    /// Load and validate a forest from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ForestLoadError> {
        let doc: ForestDoc = serde_json::from_str(json)?;
        Self::from_doc(doc)
    }

    fn from_doc(doc: ForestDoc) -> Result<Self, ForestLoadError> {
        let forest = Forest::from_trees(doc.trees.iter().map(|t| Tree::from_nodes(&t.nodes)).collect())?;
        if doc.n_features.is_some() {
            forest.validate(doc.n_features)?;
        }
        Ok(forest)
    }

    /// Serialize to JSON, recording `n_features` when given.
    pub fn to_json(&self, n_features: Option<usize>) -> Result<String, ForestLoadError> {
        Ok(serde_json::to_string_pretty(&self.to_doc(n_features))?)
    }

    /// Write JSON to `writer`.
    pub fn write_json<W: Write>(&self, writer: W, n_features: Option<usize>) -> Result<(), ForestLoadError> {
        serde_json::to_writer_pretty(writer, &self.to_doc(n_features))?;
        Ok(())
    }

    fn to_doc(&self, n_features: Option<usize>) -> ForestDoc {
        ForestDoc {
            n_features,
            trees: self.trees().map(|t| TreeDoc { nodes: t.to_nodes() }).collect(),
        }
    }
}
