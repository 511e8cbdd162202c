//! Micro-averaged Precision-Recall and ROC curves over ranked probe results.
//!
//! Every probe contributes an ordered list of `(identity, label)` pairs and a
//! matching list of `(identity, score)` pairs. All probes are pooled into a
//! single vector before the curve is computed. A label counts as positive
//! when it is greater than zero, so both `{0, 1}` and `{-1, +1}` work.

use anyhow::{Context, Result};
use ndarray::Array1;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum MetricError {
    #[error("shape mismatch: {labels} label probe(s) vs {scores} score probe(s)")]
    ProbeCount { labels: usize, scores: usize },

    #[error("shape mismatch at probe {probe}: {labels} label(s) vs {scores} score(s)")]
    ShapeMismatch {
        probe: usize,
        labels: usize,
        scores: usize,
    },

    #[error("no samples to evaluate")]
    Empty,

    #[error("curve needs both classes, got {positives} positive(s) and {negatives} negative(s)")]
    SingleClass { positives: usize, negatives: usize },

    #[error("non-finite score at probe {probe}, rank {rank}")]
    NonFiniteScore { probe: usize, rank: usize },
}

impl MetricError {
    /// Whether this error reports misaligned label/score inputs.
    pub fn is_shape_mismatch(&self) -> bool {
        matches!(self, Self::ProbeCount { .. } | Self::ShapeMismatch { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrecisionRecall {
    /// Ordered by increasing threshold; the last entry is 1.0.
    pub precision: Array1<f64>,
    /// Ordered by increasing threshold; the last entry is 0.0.
    pub recall: Array1<f64>,
    /// One per distinct score, increasing. One shorter than `precision`.
    pub thresholds: Array1<f64>,
    pub average_precision: f64,
}

/// ROC points at every distinct score; collinear intermediate points are
/// kept, so the arrays can be longer than a pruned curve with the same area.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Roc {
    pub fpr: Array1<f64>,
    pub tpr: Array1<f64>,
    /// Decreasing; the first entry is `+inf` for the `(0, 0)` point.
    pub thresholds: Array1<f64>,
    pub auc: f64,
}

/// A computed curve that can be drawn and summarized by one number.
pub trait Curve {
    fn name(&self) -> &'static str;
    fn xs(&self) -> &Array1<f64>;
    fn ys(&self) -> &Array1<f64>;
    fn summary(&self) -> f64;

    /// Legend text for the `index`-th curve of a plot (0-based).
    fn legend(&self, index: usize) -> String {
        format!("{} {} (area = {:.2})", self.name(), index + 1, self.summary())
    }
}

impl Curve for PrecisionRecall {
    fn name(&self) -> &'static str {
        "PR curve"
    }

    fn xs(&self) -> &Array1<f64> {
        &self.recall
    }

    fn ys(&self) -> &Array1<f64> {
        &self.precision
    }

    fn summary(&self) -> f64 {
        self.average_precision
    }
}

impl Curve for Roc {
    fn name(&self) -> &'static str {
        "ROC curve"
    }

    fn xs(&self) -> &Array1<f64> {
        &self.fpr
    }

    fn ys(&self) -> &Array1<f64> {
        &self.tpr
    }

    fn summary(&self) -> f64 {
        self.auc
    }
}

/// Pool all probes into one `(positive, score)` vector, probe-major.
fn flatten<I, J>(
    labels: &[Vec<(I, i32)>],
    scores: &[Vec<(J, f64)>],
) -> Result<(Array1<bool>, Array1<f64>), MetricError> {
    if labels.len() != scores.len() {
        return Err(MetricError::ProbeCount {
            labels: labels.len(),
            scores: scores.len(),
        });
    }

    let mut truth = Vec::new();
    let mut values = Vec::new();
    for (probe, (l, s)) in labels.iter().zip(scores).enumerate() {
        if l.len() != s.len() {
            return Err(MetricError::ShapeMismatch {
                probe,
                labels: l.len(),
                scores: s.len(),
            });
        }
        for (rank, ((_, label), (_, score))) in l.iter().zip(s).enumerate() {
            if !score.is_finite() {
                return Err(MetricError::NonFiniteScore { probe, rank });
            }
            truth.push(*label > 0);
            values.push(*score);
        }
    }

    if truth.is_empty() {
        return Err(MetricError::Empty);
    }
    Ok((Array1::from_vec(truth), Array1::from_vec(values)))
}

/// Cumulative (threshold, tp, fp) at every distinct score, highest first.
fn threshold_counts(truth: &Array1<bool>, scores: &Array1<f64>) -> Vec<(f64, usize, usize)> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut counts = Vec::new();
    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let current = scores[order[i]];
        while i < order.len() && scores[order[i]] == current {
            if truth[order[i]] {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        counts.push((current, tp, fp));
    }
    counts
}

fn class_counts(truth: &Array1<bool>) -> (usize, usize) {
    let positives = truth.iter().filter(|&&t| t).count();
    (positives, truth.len() - positives)
}

/// Micro-averaged precision-recall curve and average precision.
///
/// Average precision is the step-wise sum `Σ (R_n - R_{n-1}) P_n` over
/// decreasing thresholds, not a trapezoidal area.
pub fn compute_precision_recall<I, J>(
    labels: &[Vec<(I, i32)>],
    scores: &[Vec<(J, f64)>],
) -> Result<PrecisionRecall, MetricError> {
    let (truth, values) = flatten(labels, scores)?;
    let (positives, negatives) = class_counts(&truth);
    if positives == 0 {
        return Err(MetricError::SingleClass {
            positives,
            negatives,
        });
    }

    let counts = threshold_counts(&truth, &values);
    let p = positives as f64;

    let mut precision = Vec::with_capacity(counts.len() + 1);
    let mut recall = Vec::with_capacity(counts.len() + 1);
    let mut thresholds = Vec::with_capacity(counts.len());
    let mut average_precision = 0.0;
    let mut prev_recall = 0.0;

    for &(threshold, tp, fp) in &counts {
        let prec = tp as f64 / (tp + fp) as f64;
        let rec = tp as f64 / p;
        average_precision += (rec - prev_recall) * prec;
        prev_recall = rec;

        precision.push(prec);
        recall.push(rec);
        thresholds.push(threshold);
    }

    precision.reverse();
    recall.reverse();
    thresholds.reverse();
    precision.push(1.0);
    recall.push(0.0);

    log::debug!(
        "precision-recall over {} sample(s), {} threshold(s), AP = {:.4}",
        truth.len(),
        thresholds.len(),
        average_precision
    );

    Ok(PrecisionRecall {
        precision: Array1::from_vec(precision),
        recall: Array1::from_vec(recall),
        thresholds: Array1::from_vec(thresholds),
        average_precision,
    })
}

/// Micro-averaged ROC curve and its area.
pub fn compute_roc<I, J>(
    labels: &[Vec<(I, i32)>],
    scores: &[Vec<(J, f64)>],
) -> Result<Roc, MetricError> {
    let (truth, values) = flatten(labels, scores)?;
    let (positives, negatives) = class_counts(&truth);
    if positives == 0 || negatives == 0 {
        return Err(MetricError::SingleClass {
            positives,
            negatives,
        });
    }

    let counts = threshold_counts(&truth, &values);
    let (p, n) = (positives as f64, negatives as f64);

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];
    for &(threshold, tp, fp) in &counts {
        fpr.push(fp as f64 / n);
        tpr.push(tp as f64 / p);
        thresholds.push(threshold);
    }

    let fpr = Array1::from_vec(fpr);
    let tpr = Array1::from_vec(tpr);
    let area = auc(&fpr, &tpr);

    log::debug!(
        "roc over {} sample(s), {} threshold(s), AUC = {:.4}",
        truth.len(),
        counts.len(),
        area
    );

    Ok(Roc {
        fpr,
        tpr,
        thresholds: Array1::from_vec(thresholds),
        auc: area,
    })
}

/// Trapezoidal area under the polyline `(x[i], y[i])`.
pub fn auc(x: &Array1<f64>, y: &Array1<f64>) -> f64 {
    x.iter()
        .zip(y.iter())
        .zip(x.iter().zip(y.iter()).skip(1))
        .map(|((x0, y0), (x1, y1))| (x1 - x0).abs() * (y0 + y1) / 2.0)
        .sum()
}

/// Write a computed curve as pretty JSON next to its plot.
pub fn save_curve<C: Serialize>(curve: &C, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(curve)?;
    std::fs::write(path, data).with_context(|| format!("writing {}", path.display()))?;
    log::info!("saved curve data to {}", path.display());
    Ok(())
}
