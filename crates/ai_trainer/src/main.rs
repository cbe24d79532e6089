//! Churnlens trainer CLI
//!
//! Fits the churn classifier on the Telco CSV and writes the artifact bundle.

use anyhow::{Context, Result};
use churnlens_ai_core::ModelKind;
use churnlens_ai_trainer::{train_from_csv, GbdtParams, LogisticParams, TrainingConfig};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelArg {
    Gbdt,
    Logistic,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Gbdt => ModelKind::Gbdt,
            ModelArg::Logistic => ModelKind::Logistic,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "churnlens-train")]
#[command(author = "Churnlens Contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train the churn classifier and write serving artifacts", long_about = None)]
struct Args {
    /// Input CSV (Telco customer churn layout, header row, `Churn` label)
    #[arg(short, long)]
    input: PathBuf,

    /// Output directory for the artifact bundle
    #[arg(short, long, default_value = "artifacts")]
    output: PathBuf,

    /// Model family
    #[arg(long, value_enum, default_value = "gbdt")]
    model: ModelArg,

    /// Number of boosting trees
    #[arg(long, default_value = "350")]
    trees: usize,

    /// Maximum tree depth
    #[arg(long, default_value = "4")]
    max_depth: usize,

    /// Shrinkage applied to every tree
    #[arg(long, default_value = "0.08")]
    learning_rate: f64,

    /// Fraction of rows drawn per tree
    #[arg(long, default_value = "0.9")]
    subsample: f64,

    /// Fraction of features available per tree
    #[arg(long, default_value = "0.9")]
    colsample: f64,

    /// L2 penalty (leaf values for gbdt, coefficients for logistic)
    #[arg(long, default_value = "1.0")]
    reg_lambda: f64,

    /// Minimum hessian sum per child
    #[arg(long, default_value = "1.0")]
    min_child_weight: f64,

    /// Newton iterations for logistic regression
    #[arg(long, default_value = "400")]
    max_iter: usize,

    /// Share of rows held out for evaluation
    #[arg(long, default_value = "0.2")]
    test_size: f64,

    /// Seed for the split and subsampling
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Churnlens trainer v{}", env!("CARGO_PKG_VERSION"));

    let config = TrainingConfig {
        model: args.model.into(),
        gbdt: GbdtParams {
            num_trees: args.trees,
            max_depth: args.max_depth,
            learning_rate: args.learning_rate,
            subsample: args.subsample,
            colsample: args.colsample,
            reg_lambda: args.reg_lambda,
            min_child_weight: args.min_child_weight,
            seed: args.seed,
        },
        logistic: LogisticParams {
            max_iter: args.max_iter,
            reg_lambda: args.reg_lambda,
            ..LogisticParams::default()
        },
        test_size: args.test_size,
        seed: args.seed,
    };
    info!(model = %config.model, input = %args.input.display(), "starting training");

    let outcome = train_from_csv(&args.input, &args.output, &config)
        .with_context(|| format!("Training on {} failed", args.input.display()))?;

    let eval = &outcome.evaluation;
    info!(train_rows = eval.train_rows, test_rows = eval.test_rows, "hold-out evaluation");
    match eval.roc_auc {
        Some(auc) => info!("ROC AUC: {auc:.3}"),
        None => info!("ROC AUC: undefined (single class in test split)"),
    }
    for line in eval.report.to_string().lines() {
        info!("{line}");
    }

    info!(
        output = %args.output.display(),
        features = outcome.bundle.feature_names.len(),
        "✓ artifacts written"
    );
    Ok(())
}
