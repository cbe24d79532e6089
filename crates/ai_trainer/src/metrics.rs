//! Hold-out evaluation: ROC AUC and a thresholded classification report

use serde::Serialize;
use std::fmt;

/// Area under the ROC curve via the rank-sum statistic, ties averaged
///
/// `None` when only one class is present.
pub fn roc_auc(scores: &[f64], labels: &[u8]) -> Option<f64> {
    let positives = labels.iter().filter(|&&y| y == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based ranks i+1..=j+1 share their mean
        let mean_rank = (i + j + 2) as f64 / 2.0;
        rank_sum += order[i..=j]
            .iter()
            .filter(|&&k| labels[k] == 1)
            .count() as f64
            * mean_rank;
        i = j + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Precision, recall, F1 and support of one class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics at a fixed threshold plus accuracy
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub threshold: f64,
    /// Index 0 is "no churn", index 1 is "churn"
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
}

impl ClassificationReport {
    pub fn from_probabilities(probabilities: &[f64], labels: &[u8], threshold: f64) -> Self {
        let predicted: Vec<u8> = probabilities
            .iter()
            .map(|&p| u8::from(p >= threshold))
            .collect();

        let class_metrics = |class: u8| {
            let tp = count(&predicted, labels, |p, y| p == class && y == class);
            let fp = count(&predicted, labels, |p, y| p == class && y != class);
            let fn_ = count(&predicted, labels, |p, y| p != class && y == class);
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                precision,
                recall,
                f1,
                support: tp + fn_,
            }
        };

        let correct = count(&predicted, labels, |p, y| p == y);
        Self {
            threshold,
            classes: [class_metrics(0), class_metrics(1)],
            accuracy: ratio(correct, labels.len()),
        }
    }
}

fn count(predicted: &[u8], labels: &[u8], pred: impl Fn(u8, u8) -> bool) -> usize {
    predicted
        .iter()
        .zip(labels)
        .filter(|(&p, &y)| pred(p, y))
        .count()
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>12} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (name, m) in ["no churn", "churn"].iter().zip(&self.classes) {
            writeln!(
                f,
                "{:>12} {:>9.3} {:>9.3} {:>9.3} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        let total: usize = self.classes.iter().map(|m| m.support).sum();
        write!(f, "{:>12} {:>9} {:>9} {:>9.3} {:>9}", "accuracy", "", "", self.accuracy, total)
    }
}
