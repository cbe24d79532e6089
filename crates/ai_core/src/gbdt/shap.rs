//! Exact TreeSHAP for a single decision tree
//!
//! Path-dependent TreeSHAP (Lundberg et al., "Consistent Individualized
//! Feature Attribution for Tree Ensembles"). Background expectations come
//! from node `cover`, so every internal node must carry a positive cover.
//! The result satisfies local accuracy:
//! `Σ phi == tree.evaluate(x) - expected_value(tree)`.

use super::tree::Tree;
use thiserror::Error;

/// Why an exact attribution could not be computed
#[derive(Error, Debug)]
pub enum ShapError {
    #[error("node {node} has no cover statistics")]
    MissingCover { node: usize },

    #[error("malformed tree: {0}")]
    Malformed(String),

    #[error("feature vector has {actual} values, model expects {expected}")]
    WidthMismatch { expected: usize, actual: usize },

    #[error("attribution produced a non-finite value")]
    NonFinite,

    #[error("tree {tree}: {source}")]
    InTree {
        tree: usize,
        #[source]
        source: Box<ShapError>,
    },
}

impl ShapError {
    pub(crate) fn in_tree(self, tree: usize) -> Self {
        ShapError::InTree {
            tree,
            source: Box::new(self),
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct PathElement {
    feature: i32,
    zero_fraction: f64,
    one_fraction: f64,
    pweight: f64,
}

/// Per-feature Shapley values of one tree's output for `features`
pub fn tree_shap(tree: &Tree, features: &[f64]) -> Result<Vec<f64>, ShapError> {
    let mut phi = vec![0.0; features.len()];
    if tree.nodes.is_empty() {
        return Ok(phi);
    }
    let mut walker = Walker {
        tree,
        features,
        phi: &mut phi,
    };
    walker.recurse(0, &[], 0, 1.0, 1.0, -1)?;
    Ok(phi)
}

/// Cover-weighted mean leaf value of a tree
pub fn expected_value(tree: &Tree) -> Result<f64, ShapError> {
    if tree.nodes.is_empty() {
        return Ok(0.0);
    }
    node_expectation(tree, 0)
}

fn node_expectation(tree: &Tree, idx: usize) -> Result<f64, ShapError> {
    let node = &tree.nodes[idx];
    if node.is_leaf() {
        return Ok(node.leaf_value().unwrap_or(0.0));
    }
    let (left, right) = children(tree, idx)?;
    let (cl, cr) = (tree.nodes[left].cover, tree.nodes[right].cover);
    if cl + cr <= 0.0 {
        return Err(ShapError::MissingCover { node: idx });
    }
    let el = node_expectation(tree, left)?;
    let er = node_expectation(tree, right)?;
    Ok((cl * el + cr * er) / (cl + cr))
}

/// Child indices of an internal node; children must come after the parent
fn children(tree: &Tree, idx: usize) -> Result<(usize, usize), ShapError> {
    let node = &tree.nodes[idx];
    let valid = |c: i32| c >= 0 && (c as usize) > idx && (c as usize) < tree.nodes.len();
    if !valid(node.left) || !valid(node.right) {
        return Err(ShapError::Malformed(format!(
            "node {idx} has invalid children ({}, {})",
            node.left, node.right
        )));
    }
    Ok((node.left as usize, node.right as usize))
}

struct Walker<'a> {
    tree: &'a Tree,
    features: &'a [f64],
    phi: &'a mut [f64],
}

impl Walker<'_> {
    fn recurse(
        &mut self,
        idx: usize,
        parent_path: &[PathElement],
        mut depth: usize,
        zero_fraction: f64,
        one_fraction: f64,
        feature: i32,
    ) -> Result<(), ShapError> {
        let mut path = parent_path[..depth].to_vec();
        extend_path(&mut path, depth, zero_fraction, one_fraction, feature);

        let tree = self.tree;
        let node = &tree.nodes[idx];
        if node.is_leaf() {
            let value = node.leaf_value().unwrap_or(0.0);
            for i in 1..=depth {
                let weight = unwound_path_sum(&path, depth, i);
                let el = path[i];
                let slot = self
                    .phi
                    .get_mut(el.feature as usize)
                    .ok_or_else(|| ShapError::Malformed(format!("feature {} out of range", el.feature)))?;
                *slot += weight * (el.one_fraction - el.zero_fraction) * value;
            }
            return Ok(());
        }

        let (left, right) = children(tree, idx)?;
        let split = node.feature_idx;
        let value = *self.features.get(split as usize).ok_or_else(|| {
            ShapError::Malformed(format!("node {idx} splits on missing feature {split}"))
        })?;
        let (hot, cold) = if value <= node.threshold {
            (left, right)
        } else {
            (right, left)
        };

        let cover = node.cover;
        if cover <= 0.0 {
            return Err(ShapError::MissingCover { node: idx });
        }
        let hot_zero_fraction = tree.nodes[hot].cover / cover;
        let cold_zero_fraction = tree.nodes[cold].cover / cover;
        let mut incoming_zero_fraction = 1.0;
        let mut incoming_one_fraction = 1.0;

        // A feature already on the path is unwound so this split can redo it.
        if let Some(path_index) = path[..=depth].iter().position(|el| el.feature == split) {
            incoming_zero_fraction = path[path_index].zero_fraction;
            incoming_one_fraction = path[path_index].one_fraction;
            unwind_path(&mut path, depth, path_index);
            depth -= 1;
        }

        self.recurse(
            hot,
            &path,
            depth + 1,
            hot_zero_fraction * incoming_zero_fraction,
            incoming_one_fraction,
            split,
        )?;
        self.recurse(
            cold,
            &path,
            depth + 1,
            cold_zero_fraction * incoming_zero_fraction,
            0.0,
            split,
        )
    }
}

fn extend_path(
    path: &mut Vec<PathElement>,
    depth: usize,
    zero_fraction: f64,
    one_fraction: f64,
    feature: i32,
) {
    path.truncate(depth);
    path.push(PathElement {
        feature,
        zero_fraction,
        one_fraction,
        pweight: if depth == 0 { 1.0 } else { 0.0 },
    });
    let d = depth as f64;
    for i in (0..depth).rev() {
        path[i + 1].pweight += one_fraction * path[i].pweight * (i + 1) as f64 / (d + 1.0);
        path[i].pweight = zero_fraction * path[i].pweight * (d - i as f64) / (d + 1.0);
    }
}

fn unwind_path(path: &mut [PathElement], depth: usize, path_index: usize) {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = depth as f64;
    let mut next_one_portion = path[depth].pweight;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = path[i].pweight;
            path[i].pweight = next_one_portion * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            next_one_portion = tmp - path[i].pweight * zero_fraction * (d - i as f64) / (d + 1.0);
        } else {
            path[i].pweight = path[i].pweight * (d + 1.0) / (zero_fraction * (d - i as f64));
        }
    }

    for i in path_index..depth {
        path[i].feature = path[i + 1].feature;
        path[i].zero_fraction = path[i + 1].zero_fraction;
        path[i].one_fraction = path[i + 1].one_fraction;
    }
}

fn unwound_path_sum(path: &[PathElement], depth: usize, path_index: usize) -> f64 {
    let one_fraction = path[path_index].one_fraction;
    let zero_fraction = path[path_index].zero_fraction;
    let d = depth as f64;
    let mut next_one_portion = path[depth].pweight;
    let mut total = 0.0;

    for i in (0..depth).rev() {
        if one_fraction != 0.0 {
            let tmp = next_one_portion * (d + 1.0) / ((i + 1) as f64 * one_fraction);
            total += tmp;
            next_one_portion = path[i].pweight - tmp * zero_fraction * ((d - i as f64) / (d + 1.0));
        } else if zero_fraction != 0.0 {
            total += (path[i].pweight / zero_fraction) / ((d - i as f64) / (d + 1.0));
        }
    }
    total
}
