//! Model fitting
//!
//! [`GbdtTrainer`] boosts CART trees on the logistic loss with row and
//! column subsampling. [`LogisticTrainer`] fits an L2-regularized logistic
//! regression by damped Newton iterations. Both are deterministic for a
//! fixed seed.

use churnlens_ai_core::{sigmoid, GbdtModel, LogisticModel};
use tracing::{debug, info};

use crate::cart::{CartBuilder, TreeConfig};
use crate::dataset::Dataset;
use crate::deterministic::{sample_size, LcgRng};
use crate::errors::{Result, TrainerError};

/// Lower bound on per-row hessians
const MIN_HESSIAN: f64 = 1e-16;

/// Clamp for the initial churn rate before taking log-odds
const BASE_RATE_EPS: f64 = 1e-6;

/// GBDT training configuration
#[derive(Clone, Debug)]
pub struct GbdtParams {
    pub num_trees: usize,
    pub max_depth: usize,
    pub learning_rate: f64,
    /// Fraction of rows drawn for each tree
    pub subsample: f64,
    /// Fraction of features each tree may split on
    pub colsample: f64,
    pub reg_lambda: f64,
    pub min_child_weight: f64,
    pub seed: u64,
}

impl Default for GbdtParams {
    fn default() -> Self {
        Self {
            num_trees: 350,
            max_depth: 4,
            learning_rate: 0.08,
            subsample: 0.9,
            colsample: 0.9,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            seed: 42,
        }
    }
}

impl GbdtParams {
    pub fn validate(&self) -> Result<()> {
        let fraction = |name: &str, v: f64| {
            if v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(TrainerError::InvalidParameter(format!("{name} must be in (0, 1], got {v}")))
            }
        };
        fraction("subsample", self.subsample)?;
        fraction("colsample", self.colsample)?;
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(TrainerError::InvalidParameter("learning_rate must be positive".into()));
        }
        if self.reg_lambda < 0.0 || self.min_child_weight < 0.0 {
            return Err(TrainerError::InvalidParameter(
                "reg_lambda and min_child_weight must be non-negative".into(),
            ));
        }
        Ok(())
    }
}

/// GBDT trainer
pub struct GbdtTrainer {
    params: GbdtParams,
}

impl GbdtTrainer {
    pub fn new(params: GbdtParams) -> Self {
        Self { params }
    }

    /// Train a GBDT model on the given dataset
    pub fn train(&self, dataset: &Dataset) -> Result<GbdtModel> {
        self.params.validate()?;
        if dataset.is_empty() {
            return Err(TrainerError::Training("empty training set".into()));
        }

        let n = dataset.len();
        let targets: Vec<f64> = dataset.targets.iter().map(|&y| y as f64).collect();
        let bias = base_margin(&targets);
        let mut margins = vec![bias; n];
        let mut rng = LcgRng::new(self.params.seed);

        let tree_config = TreeConfig {
            max_depth: self.params.max_depth,
            min_child_weight: self.params.min_child_weight,
            reg_lambda: self.params.reg_lambda,
        };
        let rows_per_tree = sample_size(n, self.params.subsample);
        let features_per_tree = sample_size(dataset.feature_count, self.params.colsample);

        let mut trees = Vec::with_capacity(self.params.num_trees);
        for tree_idx in 0..self.params.num_trees {
            let (gradients, hessians) = gradients_hessians(&targets, &margins);

            let rows = rng.sample_indices(n, rows_per_tree);
            let columns = rng.sample_indices(dataset.feature_count, features_per_tree);

            let tree = CartBuilder::new(&dataset.features, &gradients, &hessians, tree_config.clone())
                .with_features(columns)
                .build(&rows, self.params.learning_rate);

            for (margin, row) in margins.iter_mut().zip(&dataset.features) {
                *margin += tree.weight * tree.evaluate(row);
            }

            if (tree_idx + 1) % 50 == 0 {
                debug!(
                    tree = tree_idx + 1,
                    loss = log_loss(&targets, &margins),
                    "boosting progress"
                );
            }
            trees.push(tree);
        }

        info!(
            trees = trees.len(),
            bias,
            train_loss = log_loss(&targets, &margins),
            "gbdt training finished"
        );
        Ok(GbdtModel::new(trees, bias, dataset.feature_count))
    }
}

/// Log-odds of the training churn rate
fn base_margin(targets: &[f64]) -> f64 {
    let rate = targets.iter().sum::<f64>() / targets.len() as f64;
    let rate = rate.clamp(BASE_RATE_EPS, 1.0 - BASE_RATE_EPS);
    (rate / (1.0 - rate)).ln()
}

/// Logistic loss derivatives w.r.t. the margin
fn gradients_hessians(targets: &[f64], margins: &[f64]) -> (Vec<f64>, Vec<f64>) {
    targets
        .iter()
        .zip(margins)
        .map(|(y, m)| {
            let p = sigmoid(*m);
            (p - y, (p * (1.0 - p)).max(MIN_HESSIAN))
        })
        .unzip()
}

fn log_loss(targets: &[f64], margins: &[f64]) -> f64 {
    let total: f64 = targets
        .iter()
        .zip(margins)
        .map(|(y, m)| {
            // log(1 + e^m) - y·m, stable for large |m|
            let softplus = if *m > 0.0 { m + (-m).exp().ln_1p() } else { m.exp().ln_1p() };
            softplus - y * m
        })
        .sum();
    total / targets.len().max(1) as f64
}

/// Logistic regression configuration
#[derive(Clone, Debug)]
pub struct LogisticParams {
    pub max_iter: usize,
    /// L2 penalty on coefficients (not the intercept)
    pub reg_lambda: f64,
    /// Stop once the largest parameter update falls below this
    pub tolerance: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            max_iter: 400,
            reg_lambda: 1.0,
            tolerance: 1e-8,
        }
    }
}

/// Logistic regression trainer
pub struct LogisticTrainer {
    params: LogisticParams,
}

impl LogisticTrainer {
    pub fn new(params: LogisticParams) -> Self {
        Self { params }
    }

    /// Minimize `Σ logloss + ½·λ·‖w‖²` by Newton steps with backtracking
    pub fn train(&self, dataset: &Dataset) -> Result<LogisticModel> {
        if dataset.is_empty() {
            return Err(TrainerError::Training("empty training set".into()));
        }
        if self.params.reg_lambda < 0.0 {
            return Err(TrainerError::InvalidParameter("reg_lambda must be non-negative".into()));
        }

        let d = dataset.feature_count;
        let targets: Vec<f64> = dataset.targets.iter().map(|&y| y as f64).collect();
        // theta[0] is the intercept
        let mut theta = vec![0.0; d + 1];
        theta[0] = base_margin(&targets);
        let mut objective = self.objective(dataset, &targets, &theta);

        let mut converged = false;
        for iter in 0..self.params.max_iter {
            let (gradient, hessian) = self.derivatives(dataset, &targets, &theta);
            let step = solve_spd(hessian, &gradient).ok_or_else(|| {
                TrainerError::Training("Newton system is singular; increase reg_lambda".into())
            })?;

            let mut scale = 1.0;
            let mut candidate: Vec<f64>;
            loop {
                candidate = theta.iter().zip(&step).map(|(t, s)| t - scale * s).collect();
                let value = self.objective(dataset, &targets, &candidate);
                if value <= objective || scale < 1e-10 {
                    objective = value;
                    break;
                }
                scale /= 2.0;
            }

            let max_update = step.iter().fold(0.0f64, |m, s| m.max((scale * s).abs()));
            theta = candidate;
            if max_update < self.params.tolerance {
                debug!(iterations = iter + 1, "logistic regression converged");
                converged = true;
                break;
            }
        }
        if !converged {
            debug!(max_iter = self.params.max_iter, "logistic regression hit max_iter");
        }

        let intercept = theta[0];
        let coefficients = theta[1..].to_vec();
        info!(
            features = d,
            intercept,
            objective,
            "logistic training finished"
        );
        Ok(LogisticModel::new(coefficients, intercept))
    }

    fn margin(row: &[f64], theta: &[f64]) -> f64 {
        row.iter().zip(&theta[1..]).fold(theta[0], |z, (x, w)| z + x * w)
    }

    fn objective(&self, dataset: &Dataset, targets: &[f64], theta: &[f64]) -> f64 {
        let margins: Vec<f64> = dataset.features.iter().map(|r| Self::margin(r, theta)).collect();
        let penalty: f64 = theta[1..].iter().map(|w| w * w).sum::<f64>();
        log_loss(targets, &margins) * targets.len() as f64 + 0.5 * self.params.reg_lambda * penalty
    }

    fn derivatives(&self, dataset: &Dataset, targets: &[f64], theta: &[f64]) -> (Vec<f64>, Vec<Vec<f64>>) {
        let dim = theta.len();
        let mut gradient = vec![0.0; dim];
        let mut hessian = vec![vec![0.0; dim]; dim];
        let mut augmented = vec![1.0; dim];

        for (row, y) in dataset.features.iter().zip(targets) {
            augmented[1..].copy_from_slice(row);
            let p = sigmoid(Self::margin(row, theta));
            let w = (p * (1.0 - p)).max(MIN_HESSIAN);
            for i in 0..dim {
                gradient[i] += (p - y) * augmented[i];
                if augmented[i] == 0.0 {
                    continue;
                }
                for j in 0..=i {
                    hessian[i][j] += w * augmented[i] * augmented[j];
                }
            }
        }

        for i in 1..dim {
            gradient[i] += self.params.reg_lambda * theta[i];
            hessian[i][i] += self.params.reg_lambda;
        }
        // mirror the lower triangle
        for i in 0..dim {
            for j in 0..i {
                hessian[j][i] = hessian[i][j];
            }
        }
        (gradient, hessian)
    }
}

/// Solve `A·x = b` for symmetric positive-definite `A` by Cholesky
fn solve_spd(mut a: Vec<Vec<f64>>, b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    for j in 0..n {
        let mut diag = a[j][j];
        for k in 0..j {
            diag -= a[j][k] * a[j][k];
        }
        if diag.is_nan() || diag <= 0.0 {
            return None;
        }
        let diag = diag.sqrt();
        a[j][j] = diag;
        for i in (j + 1)..n {
            let mut v = a[i][j];
            for k in 0..j {
                v -= a[i][k] * a[j][k];
            }
            a[i][j] = v / diag;
        }
    }

    // forward substitution L·y = b
    let mut y = vec![0.0; n];
    for i in 0..n {
        let s: f64 = (0..i).map(|k| a[i][k] * y[k]).sum();
        y[i] = (b[i] - s) / a[i][i];
    }
    // back substitution Lᵀ·x = y
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let s: f64 = ((i + 1)..n).map(|k| a[k][i] * x[k]).sum();
        x[i] = (y[i] - s) / a[i][i];
    }
    Some(x)
}
