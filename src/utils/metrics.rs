//! Classification metrics for thresholded anomaly scores.
//!
//! - **Confusion matrix** and the rates derived from it (accuracy,
//!   precision, recall, F1, FPR, Cohen's kappa)
//! - **AUROC** from raw scores, independent of any threshold
//! - **Sliding window** over the most recent scored records

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Confusion matrix for binary anomaly detection. "Positive" means anomalous.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a prediction.
    pub fn record(&mut self, actual_anomaly: bool, predicted_anomaly: bool) {
        match (actual_anomaly, predicted_anomaly) {
            (true, true) => self.tp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fp += 1,
            (true, false) => self.fn_ += 1,
        }
    }

    /// Undo a previously recorded prediction (used by the sliding window).
    fn forget(&mut self, actual_anomaly: bool, predicted_anomaly: bool) {
        let slot = match (actual_anomaly, predicted_anomaly) {
            (true, true) => &mut self.tp,
            (false, false) => &mut self.tn,
            (false, true) => &mut self.fp,
            (true, false) => &mut self.fn_,
        };
        *slot = slot.saturating_sub(1);
    }

    pub fn total(&self) -> usize {
        self.tp + self.tn + self.fp + self.fn_
    }

    pub fn actual_positive(&self) -> usize {
        self.tp + self.fn_
    }

    pub fn actual_negative(&self) -> usize {
        self.tn + self.fp
    }
}

/// Rates derived from a confusion matrix. Undefined ratios are reported as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// False positive rate = FP / (FP + TN).
    pub fpr: f64,
    /// Cohen's kappa: agreement beyond what the class balance explains.
    pub kappa: f64,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den > 0 {
        num as f64 / den as f64
    } else {
        0.0
    }
}

impl Metrics {
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let total = cm.total();
        let accuracy = ratio(cm.tp + cm.tn, total);
        let precision = ratio(cm.tp, cm.tp + cm.fp);
        let recall = ratio(cm.tp, cm.tp + cm.fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        let fpr = ratio(cm.fp, cm.fp + cm.tn);

        let kappa = if total > 0 {
            let n = total as f64;
            let predicted_pos = (cm.tp + cm.fp) as f64;
            let predicted_neg = (cm.tn + cm.fn_) as f64;
            let expected = (predicted_pos * cm.actual_positive() as f64
                + predicted_neg * cm.actual_negative() as f64)
                / (n * n);
            if expected < 1.0 {
                (accuracy - expected) / (1.0 - expected)
            } else {
                0.0
            }
        } else {
            0.0
        };

        Metrics {
            accuracy,
            precision,
            recall,
            f1,
            fpr,
            kappa,
        }
    }
}

/// Area under the ROC curve via the Mann-Whitney rank statistic.
///
/// Tied scores share their average rank. Returns 0.5 when only one class is
/// present, since the curve is undefined there.
pub fn auroc(labels: &[bool], scores: &[f64]) -> f64 {
    let n = labels.len().min(scores.len());
    let positives = labels[..n].iter().filter(|&&l| l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return 0.5;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && scores[order[j]] == scores[order[i]] {
            j += 1;
        }
        // Ranks are 1-based; the tie group i..j shares the mean rank.
        let avg_rank = (i + 1 + j) as f64 / 2.0;
        for &idx in &order[i..j] {
            if labels[idx] {
                positive_rank_sum += avg_rank;
            }
        }
        i = j;
    }

    let p = positives as f64;
    (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

/// Metrics over the last `capacity` scored records.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    labels: VecDeque<bool>,
    scores: VecDeque<f64>,
    predictions: VecDeque<bool>,
    confusion: ConfusionMatrix,
}

impl SlidingWindow {
    pub fn new(capacity: usize) -> Self {
        SlidingWindow {
            capacity,
            labels: VecDeque::with_capacity(capacity),
            scores: VecDeque::with_capacity(capacity),
            predictions: VecDeque::with_capacity(capacity),
            confusion: ConfusionMatrix::new(),
        }
    }

    pub fn push(&mut self, actual_anomaly: bool, score: f64, predicted_anomaly: bool) {
        self.labels.push_back(actual_anomaly);
        self.scores.push_back(score);
        self.predictions.push_back(predicted_anomaly);
        self.confusion.record(actual_anomaly, predicted_anomaly);

        if self.labels.len() > self.capacity {
            if let (Some(label), Some(pred)) =
                (self.labels.pop_front(), self.predictions.pop_front())
            {
                self.confusion.forget(label, pred);
            }
            self.scores.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn confusion(&self) -> ConfusionMatrix {
        self.confusion
    }

    pub fn auroc(&self) -> f64 {
        let labels: Vec<bool> = self.labels.iter().copied().collect();
        let scores: Vec<f64> = self.scores.iter().copied().collect();
        auroc(&labels, &scores)
    }
}
