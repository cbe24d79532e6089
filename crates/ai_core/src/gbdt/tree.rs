//! Decision tree structures for GBDT inference and attribution
//!
//! Nodes keep the training statistics (`cover`, `gain`) next to the split so
//! the same artifact serves prediction, global importances and TreeSHAP.

use serde::{Deserialize, Serialize};

/// A decision tree node (internal or leaf)
///
/// For internal nodes:
/// - `feature_idx >= 0`: index into the feature vector
/// - `left` and `right` point to child node indices
/// - `leaf` is `None`
///
/// For leaf nodes:
/// - `feature_idx == -1`
/// - `leaf` contains the prediction value (log-odds units)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    /// Node ID (for reference, not used in traversal)
    pub id: i32,

    /// Left child index (-1 for leaf nodes)
    pub left: i32,

    /// Right child index (-1 for leaf nodes)
    pub right: i32,

    /// Feature index to split on (-1 for leaf nodes)
    #[serde(rename = "feature_idx", alias = "feature")]
    pub feature_idx: i32,

    /// Split threshold; `x <= threshold` goes left
    pub threshold: f64,

    /// Leaf value (Some for leaf nodes, None for internal nodes)
    pub leaf: Option<f64>,

    /// Hessian mass of training samples that reached this node
    #[serde(default)]
    pub cover: f64,

    /// Loss reduction of this split (0 for leaves)
    #[serde(default)]
    pub gain: f64,
}

impl Node {
    /// Create a new internal (split) node
    pub fn internal(id: i32, feature_idx: i32, threshold: f64, left: i32, right: i32) -> Self {
        Self {
            id,
            left,
            right,
            feature_idx,
            threshold,
            leaf: None,
            cover: 0.0,
            gain: 0.0,
        }
    }

    /// Create a new leaf node
    pub fn leaf(id: i32, value: f64) -> Self {
        Self {
            id,
            left: -1,
            right: -1,
            feature_idx: -1,
            threshold: 0.0,
            leaf: Some(value),
            cover: 0.0,
            gain: 0.0,
        }
    }

    /// Attach training statistics
    pub fn with_stats(mut self, cover: f64, gain: f64) -> Self {
        self.cover = cover;
        self.gain = gain;
        self
    }

    /// Check if this node is a leaf
    pub fn is_leaf(&self) -> bool {
        self.feature_idx == -1 || self.leaf.is_some()
    }

    /// Get the leaf value if this is a leaf node
    pub fn leaf_value(&self) -> Option<f64> {
        self.leaf
    }
}

/// A single decision tree
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tree {
    /// Tree nodes (node 0 is the root)
    pub nodes: Vec<Node>,

    /// Multiplier applied to the leaf value when aggregating the ensemble
    pub weight: f64,
}

impl Tree {
    /// Create a new tree with the given nodes and weight
    pub fn new(nodes: Vec<Node>, weight: f64) -> Self {
        Self { nodes, weight }
    }

    /// Index of the child a feature vector follows from `node`
    pub(crate) fn next_child(&self, node: &Node, features: &[f64]) -> Option<usize> {
        let value = *features.get(node.feature_idx as usize)?;
        let child = if value <= node.threshold {
            node.left
        } else {
            node.right
        };
        if child < 0 || child as usize >= self.nodes.len() {
            return None;
        }
        Some(child as usize)
    }

    /// Evaluate this tree on a feature vector
    ///
    /// Malformed paths (dangling child, missing feature) evaluate to 0.
    pub fn evaluate(&self, features: &[f64]) -> f64 {
        let mut idx = 0usize;
        // A well-formed tree visits each node at most once.
        for _ in 0..self.nodes.len() {
            let Some(node) = self.nodes.get(idx) else {
                return 0.0;
            };
            if node.is_leaf() {
                return node.leaf_value().unwrap_or(0.0);
            }
            match self.next_child(node, features) {
                Some(next) => idx = next,
                None => return 0.0,
            }
        }
        0.0
    }

    /// Validate tree structure against the expected feature width
    pub fn validate(&self, feature_count: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("Tree has no nodes".to_string());
        }

        for (i, node) in self.nodes.iter().enumerate() {
            if !node.is_leaf() {
                if node.left < 0 || node.left as usize >= self.nodes.len() {
                    return Err(format!("Node {} has invalid left child: {}", i, node.left));
                }
                if node.right < 0 || node.right as usize >= self.nodes.len() {
                    return Err(format!(
                        "Node {} has invalid right child: {}",
                        i, node.right
                    ));
                }
                if node.left as usize <= i || node.right as usize <= i {
                    return Err(format!("Node {i} points backwards"));
                }
                if node.feature_idx < 0 || node.feature_idx as usize >= feature_count {
                    return Err(format!(
                        "Internal node {} has invalid feature index: {}",
                        i, node.feature_idx
                    ));
                }
                if !node.threshold.is_finite() {
                    return Err(format!("Internal node {i} has a non-finite threshold"));
                }
            } else {
                match node.leaf {
                    Some(value) if value.is_finite() => {}
                    Some(_) => return Err(format!("Leaf node {i} has a non-finite value")),
                    None => return Err(format!("Leaf node {i} has no leaf value")),
                }
            }
        }

        Ok(())
    }
}
