// Metrics - score resolved labels against ground truth
//
// CALL is the positive class. Rows the model left unresolved (ABSTAIN) are
// excluded from every metric except coverage, which is a property of the
// label matrix itself.

use std::fmt;

use sbws_common::{Label, Vote};
use serde::{Deserialize, Serialize};

/// Metric reported by [`super::LabelModel::score`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Accuracy,
    Coverage,
    Precision,
    Recall,
    F1,
}

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Accuracy,
        Metric::Coverage,
        Metric::Precision,
        Metric::Recall,
        Metric::F1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Coverage => "coverage",
            Metric::Precision => "precision",
            Metric::Recall => "recall",
            Metric::F1 => "f1",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Confusion counts over resolved predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confusion {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
    /// Predictions left as ABSTAIN (not scored)
    pub unresolved: usize,
}

impl Confusion {
    /// Tally predictions against gold labels (aligned 1:1)
    pub fn tally(predictions: &[Vote], gold: &[Label]) -> Self {
        let mut counts = Confusion::default();
        for (pred, truth) in predictions.iter().zip(gold) {
            match (pred.label(), truth) {
                (None, _) => counts.unresolved += 1,
                (Some(Label::Call), Label::Call) => counts.true_positive += 1,
                (Some(Label::Call), Label::NotCall) => counts.false_positive += 1,
                (Some(Label::NotCall), Label::NotCall) => counts.true_negative += 1,
                (Some(Label::NotCall), Label::Call) => counts.false_negative += 1,
            }
        }
        counts
    }

    pub fn resolved(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positive + self.true_negative, self.resolved())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_positive)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positive, self.true_positive + self.false_negative)
    }

    /// Harmonic mean of precision and recall; 0.0 when both are 0
    pub fn f1(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// 0.0 for an empty denominator
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Value of one metric
pub fn metric_value(metric: Metric, confusion: &Confusion, coverage: f64) -> f64 {
    match metric {
        Metric::Accuracy => confusion.accuracy(),
        Metric::Coverage => coverage,
        Metric::Precision => confusion.precision(),
        Metric::Recall => confusion.recall(),
        Metric::F1 => confusion.f1(),
    }
}
