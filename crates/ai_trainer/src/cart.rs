//! CART (Classification and Regression Tree) builder
//!
//! Exact-greedy second-order tree construction: every candidate threshold
//! of every allowed feature is scored with the regularized gain
//!
//! ```text
//! gain = ½ · (G_L²/(H_L+λ) + G_R²/(H_R+λ) − G²/(H+λ))
//! ```
//!
//! and leaves take the value `−G/(H+λ)`. Nodes record their hessian sum as
//! `cover` and their split gain, which TreeSHAP and the importances need.
//! Ties keep the first candidate in (feature, threshold) order.

use churnlens_ai_core::gbdt::{Node, Tree};

/// Training parameters for a single tree
#[derive(Clone, Debug)]
pub struct TreeConfig {
    pub max_depth: usize,
    /// Minimum hessian sum on each side of a split
    pub min_child_weight: f64,
    /// L2 penalty on leaf values
    pub reg_lambda: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_child_weight: 1.0,
            reg_lambda: 1.0,
        }
    }
}

/// Split candidate
#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature_idx: usize,
    threshold: f64,
    gain: f64,
}

/// Builds one regression tree on gradient statistics
pub struct CartBuilder<'a> {
    config: TreeConfig,
    features: &'a [Vec<f64>],
    gradients: &'a [f64],
    hessians: &'a [f64],
    /// Features this tree may split on
    allowed: Vec<usize>,
}

impl<'a> CartBuilder<'a> {
    /// `features`, `gradients` and `hessians` are index-aligned by row
    pub fn new(
        features: &'a [Vec<f64>],
        gradients: &'a [f64],
        hessians: &'a [f64],
        config: TreeConfig,
    ) -> Self {
        let feature_count = features.first().map_or(0, Vec::len);
        Self {
            config,
            features,
            gradients,
            hessians,
            allowed: (0..feature_count).collect(),
        }
    }

    /// Restrict splits to a feature subset
    pub fn with_features(mut self, allowed: Vec<usize>) -> Self {
        self.allowed = allowed;
        self
    }

    /// Build a tree over the given rows, weighted by `weight` in the ensemble
    pub fn build(&self, rows: &[usize], weight: f64) -> Tree {
        let mut nodes = Vec::new();
        self.build_node(rows, 0, &mut nodes);
        Tree::new(nodes, weight)
    }

    /// Recursively build nodes in pre-order; returns the new node's index
    fn build_node(&self, rows: &[usize], depth: usize, nodes: &mut Vec<Node>) -> i32 {
        let current = nodes.len();
        let (g, h) = self.sums(rows);

        let split = if depth < self.config.max_depth {
            self.find_best_split(rows, g, h)
        } else {
            None
        };

        let Some(split) = split else {
            nodes.push(Node::leaf(current as i32, self.leaf_value(g, h)).with_stats(h, 0.0));
            return current as i32;
        };

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&r| self.features[r][split.feature_idx] <= split.threshold);

        // Reserve space for current node
        nodes.push(
            Node::internal(current as i32, split.feature_idx as i32, split.threshold, -1, -1)
                .with_stats(h, split.gain),
        );

        let left = self.build_node(&left_rows, depth + 1, nodes);
        let right = self.build_node(&right_rows, depth + 1, nodes);
        nodes[current].left = left;
        nodes[current].right = right;

        current as i32
    }

    fn find_best_split(&self, rows: &[usize], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.config.reg_lambda;
        let parent_score = score(g, h, lambda);
        let mut best: Option<SplitCandidate> = None;

        for &feature_idx in &self.allowed {
            let mut order: Vec<usize> = rows.to_vec();
            order.sort_by(|&a, &b| {
                self.features[a][feature_idx].total_cmp(&self.features[b][feature_idx])
            });

            let (mut gl, mut hl) = (0.0, 0.0);
            for pair in order.windows(2) {
                let (row, next) = (pair[0], pair[1]);
                gl += self.gradients[row];
                hl += self.hessians[row];

                let value = self.features[row][feature_idx];
                let next_value = self.features[next][feature_idx];
                if value == next_value {
                    continue;
                }
                let (gr, hr) = (g - gl, h - hl);
                if hl < self.config.min_child_weight || hr < self.config.min_child_weight {
                    continue;
                }

                let gain = 0.5 * (score(gl, hl, lambda) + score(gr, hr, lambda) - parent_score);
                if gain > 0.0 && best.map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature_idx,
                        threshold: (value + next_value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    /// Sum gradients and hessians for a set of rows
    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter().fold((0.0, 0.0), |(g, h), &r| {
            (g + self.gradients[r], h + self.hessians[r])
        })
    }

    /// Optimal leaf value: -G/(H+λ)
    fn leaf_value(&self, g: f64, h: f64) -> f64 {
        let denom = h + self.config.reg_lambda;
        if denom <= 0.0 {
            return 0.0;
        }
        -g / denom
    }
}

fn score(g: f64, h: f64, lambda: f64) -> f64 {
    let denom = h + lambda;
    if denom <= 0.0 {
        0.0
    } else {
        g * g / denom
    }
}
