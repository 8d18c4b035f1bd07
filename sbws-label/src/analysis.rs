// LF Analysis - per-voter diagnostics over a label matrix
//
// Polarity, coverage, overlaps and conflicts are properties of the matrix
// alone. Empirical accuracy needs aligned ground truth and is None without it.

use std::collections::BTreeSet;

use sbws_common::{Label, Vote};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::matrix::LabelMatrix;

/// Diagnostics for one labeling function (one matrix column)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LfSummary {
    pub name: String,
    /// Distinct non-abstain votes this function emitted
    pub polarity: Vec<Vote>,
    /// Fraction of rows with a non-abstain vote
    pub coverage: f64,
    /// Fraction of rows where this and at least one other function voted
    pub overlaps: f64,
    /// Fraction of rows where another function voted the opposite way
    pub conflicts: f64,
    /// Number of correct votes (with ground truth)
    pub correct: Option<usize>,
    /// Number of incorrect votes (with ground truth)
    pub incorrect: Option<usize>,
    /// correct / (correct + incorrect); None without ground truth or votes
    pub empirical_accuracy: Option<f64>,
}

/// Summarize every column of `matrix`
///
/// `gold` is ignored (with a warning) when its length does not match.
pub fn summarize(matrix: &LabelMatrix, gold: Option<&[Label]>) -> Vec<LfSummary> {
    let gold = match gold {
        Some(labels) if labels.len() != matrix.n_rows() => {
            warn!(
                "Ignoring ground truth for LF analysis: {} labels for {} rows",
                labels.len(),
                matrix.n_rows()
            );
            None
        }
        other => other,
    };

    let n_rows = matrix.n_rows();
    let fraction = |count: usize| {
        if n_rows == 0 {
            0.0
        } else {
            count as f64 / n_rows as f64
        }
    };

    let summaries: Vec<LfSummary> = matrix
        .columns()
        .iter()
        .enumerate()
        .map(|(j, name)| {
            let mut polarity = BTreeSet::new();
            let mut covered = 0;
            let mut overlapping = 0;
            let mut conflicting = 0;

            for row in matrix.rows() {
                let own = row[j];
                if own.is_abstain() {
                    continue;
                }
                polarity.insert(own.as_i8());
                covered += 1;

                let others = row
                    .iter()
                    .enumerate()
                    .filter(|(k, v)| *k != j && !v.is_abstain());
                let mut overlap = false;
                let mut conflict = false;
                for (_, other) in others {
                    overlap = true;
                    if *other != own {
                        conflict = true;
                    }
                }
                overlapping += usize::from(overlap);
                conflicting += usize::from(conflict);
            }

            let (correct, incorrect) = match gold {
                Some(labels) => {
                    let (mut right, mut wrong) = (0, 0);
                    for (vote, truth) in matrix.column(j).zip(labels) {
                        match vote.label() {
                            Some(label) if label == *truth => right += 1,
                            Some(_) => wrong += 1,
                            None => {}
                        }
                    }
                    (Some(right), Some(wrong))
                }
                None => (None, None),
            };

            let empirical_accuracy = match (correct, incorrect) {
                (Some(c), Some(i)) if c + i > 0 => Some(c as f64 / (c + i) as f64),
                _ => None,
            };

            LfSummary {
                name: name.clone(),
                polarity: polarity.into_iter().filter_map(Vote::from_i8).collect(),
                coverage: fraction(covered),
                overlaps: fraction(overlapping),
                conflicts: fraction(conflicting),
                correct,
                incorrect,
                empirical_accuracy,
            }
        })
        .collect();

    for summary in &summaries {
        if summary.coverage == 0.0 {
            debug!("Labeling function '{}' never voted", summary.name);
        }
    }

    summaries
}
