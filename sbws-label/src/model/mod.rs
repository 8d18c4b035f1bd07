//! Generative label model
//!
//! Resolves a label matrix into one label per record by learning how
//! reliable each labeling function is, without per-record ground truth.
//!
//! # Model
//!
//! One-coin generative model: each voter `j` has an accuracy
//! `a_j = P(vote = y | Y = y, vote != ABSTAIN)` and the classes have a
//! balance `π = P(Y = CALL)`. Abstains are dropped from every likelihood
//! term, so they never count as NOTCALL. Given the parameters, the
//! posterior log-odds of a row is
//!
//! ```text
//! logit(π) + Σ_j s_j · ln(a_j / (1 - a_j))     s_j = +1 CALL, -1 NOTCALL
//! ```
//!
//! Parameters are fitted with EM for at most `epochs` iterations. The
//! agreement between voters is what identifies their accuracies; ground
//! truth, when supplied, pins the posteriors of labeled rows and fixes
//! the class balance to the empirical label balance.
//!
//! # Lifecycle
//!
//! `LabelModel::new(2)` → `fit` → `predict` / `score`. Queries before a
//! successful fit return `Error::NotFitted`.

pub mod metrics;

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sbws_common::config::ModelConfig;
use sbws_common::{Error, Label, Result, TieBreak, Vote};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::matrix::LabelMatrix;
pub use metrics::{Confusion, Metric};

/// Number of classes (CALL / NOTCALL)
pub const CARDINALITY: usize = 2;

/// Accuracy estimates are kept inside this band so weights stay finite
const ACCURACY_FLOOR: f64 = 0.01;
const ACCURACY_CEIL: f64 = 0.99;

/// Starting accuracy for every voter without supervision
const PRIOR_ACCURACY: f64 = 0.7;

/// Pseudo-count strength of the accuracy prior
const PRIOR_STRENGTH: f64 = 2.0;

/// Half-width of the seeded jitter on initial accuracies
const INIT_JITTER: f64 = 0.05;

/// |p - 0.5| below this is an exact tie
const TIE_EPSILON: f64 = 1e-9;

/// Fitting parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub epochs: usize,
    pub seed: u64,
    pub tolerance: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 500,
            seed: 123,
            tolerance: 1e-6,
        }
    }
}

impl From<&ModelConfig> for FitOptions {
    fn from(config: &ModelConfig) -> Self {
        Self {
            epochs: config.epochs,
            seed: config.seed,
            tolerance: config.tolerance,
        }
    }
}

/// Learned parameters of one labeling function, for inspection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoterWeight {
    pub name: String,
    /// Estimated P(vote correct | vote cast)
    pub accuracy: f64,
    /// Log-odds contribution of a vote: ln(a / (1 - a))
    pub weight: f64,
    /// Fraction of training rows with a non-abstain vote
    pub coverage: f64,
    /// Voter whose votes correlate most with this one (by |r|)
    pub most_correlated: Option<String>,
    /// Pearson correlation with `most_correlated` over co-voted rows
    pub correlation: f64,
}

#[derive(Debug, Clone)]
struct Fitted {
    columns: Vec<String>,
    accuracies: Vec<f64>,
    coverage: Vec<f64>,
    correlations: Vec<Vec<f64>>,
    class_balance: f64,
    epochs_run: usize,
    rng: StdRng,
}

#[derive(Debug, Clone)]
enum State {
    Uninitialized,
    Fitted(Box<Fitted>),
}

/// Generative label model over a [`LabelMatrix`]
#[derive(Debug, Clone)]
pub struct LabelModel {
    cardinality: usize,
    state: State,
}

impl Default for LabelModel {
    fn default() -> Self {
        Self {
            cardinality: CARDINALITY,
            state: State::Uninitialized,
        }
    }
}

impl LabelModel {
    /// Create an unfitted model
    ///
    /// # Errors
    /// `Error::Configuration` for any cardinality other than 2.
    pub fn new(cardinality: usize) -> Result<Self> {
        if cardinality != CARDINALITY {
            return Err(Error::Configuration(format!(
                "label model supports cardinality {} only, got {}",
                CARDINALITY, cardinality
            )));
        }
        Ok(Self::default())
    }

    pub fn cardinality(&self) -> usize {
        self.cardinality
    }

    pub fn is_fitted(&self) -> bool {
        matches!(self.state, State::Fitted(_))
    }

    /// Learn voter accuracies (and class balance) from a training matrix
    ///
    /// Refitting replaces all previous state.
    ///
    /// # Errors
    /// `Error::ModelFit` when the matrix has no rows or no columns, or the
    /// ground truth is not aligned with the matrix rows.
    pub fn fit(
        &mut self,
        train: &LabelMatrix,
        ground_truth: Option<&[Label]>,
        options: FitOptions,
    ) -> Result<()> {
        if train.n_cols() == 0 {
            return Err(Error::ModelFit(
                "label matrix has zero columns (no active labeling functions)".to_string(),
            ));
        }
        if train.n_rows() == 0 {
            return Err(Error::ModelFit("label matrix has zero rows".to_string()));
        }
        if let Some(gold) = ground_truth {
            if gold.len() != train.n_rows() {
                return Err(Error::ModelFit(format!(
                    "ground truth has {} labels for {} rows",
                    gold.len(),
                    train.n_rows()
                )));
            }
        }

        debug!(
            "Fitting label model: {} rows x {} voters, epochs={}, seed={}, supervised={}",
            train.n_rows(),
            train.n_cols(),
            options.epochs,
            options.seed,
            ground_truth.is_some()
        );

        let mut rng = StdRng::seed_from_u64(options.seed);
        let n_rows = train.n_rows();
        let n_cols = train.n_cols();

        let coverage: Vec<f64> = (0..n_cols)
            .map(|j| train.column(j).filter(|v| !v.is_abstain()).count() as f64 / n_rows as f64)
            .collect();

        // Initial accuracies: supervised estimate or prior, plus seeded jitter
        let mut accuracies: Vec<f64> = (0..n_cols)
            .map(|j| {
                let base = match ground_truth {
                    Some(gold) => empirical_accuracy(train, j, gold),
                    None => PRIOR_ACCURACY,
                };
                clamp_accuracy(base + rng.gen_range(-INIT_JITTER..INIT_JITTER))
            })
            .collect();

        let mut class_balance = match ground_truth {
            Some(gold) => clamp_accuracy(
                gold.iter().filter(|l| **l == Label::Call).count() as f64 / gold.len() as f64,
            ),
            None => 0.5,
        };

        let mut posteriors = vec![0.5; n_rows];
        let mut epochs_run = 0;

        for epoch in 0..options.epochs {
            epochs_run = epoch + 1;

            // E-step
            for (i, q) in posteriors.iter_mut().enumerate() {
                *q = match ground_truth {
                    Some(gold) => label_probability(gold[i]),
                    None => row_probability(train.row(i), &accuracies, class_balance),
                };
            }

            // M-step
            let mut max_delta: f64 = 0.0;
            for (j, accuracy) in accuracies.iter_mut().enumerate() {
                let mut agreement = 0.0;
                let mut cast = 0.0;
                for (vote, q) in train.column(j).zip(&posteriors) {
                    match vote {
                        Vote::Call => agreement += q,
                        Vote::NotCall => agreement += 1.0 - q,
                        Vote::Abstain => continue,
                    }
                    cast += 1.0;
                }
                let updated = clamp_accuracy(
                    (agreement + PRIOR_ACCURACY * PRIOR_STRENGTH) / (cast + PRIOR_STRENGTH),
                );
                max_delta = max_delta.max((updated - *accuracy).abs());
                *accuracy = updated;
            }

            if ground_truth.is_none() {
                let updated = clamp_accuracy(posteriors.iter().sum::<f64>() / n_rows as f64);
                max_delta = max_delta.max((updated - class_balance).abs());
                class_balance = updated;
            }

            if max_delta < options.tolerance {
                debug!("Label model converged after {} epochs", epochs_run);
                break;
            }
        }

        let correlations = vote_correlations(train);

        info!(
            "Label model fitted: {} voters, class balance {:.3}, {} epochs",
            n_cols, class_balance, epochs_run
        );

        self.state = State::Fitted(Box::new(Fitted {
            columns: train.columns().to_vec(),
            accuracies,
            coverage,
            correlations,
            class_balance,
            epochs_run,
            rng,
        }));

        Ok(())
    }

    fn fitted(&self) -> Result<&Fitted> {
        match &self.state {
            State::Fitted(fitted) => Ok(fitted),
            State::Uninitialized => Err(Error::NotFitted),
        }
    }

    fn fitted_for(&self, matrix: &LabelMatrix) -> Result<&Fitted> {
        let fitted = self.fitted()?;
        if matrix.columns() != fitted.columns.as_slice() {
            return Err(Error::ModelFit(format!(
                "matrix columns do not match the fitted voters ({} vs {})",
                matrix.n_cols(),
                fitted.columns.len()
            )));
        }
        Ok(fitted)
    }

    /// P(CALL) for every row
    pub fn predict_proba(&self, matrix: &LabelMatrix) -> Result<Vec<f64>> {
        let fitted = self.fitted_for(matrix)?;
        Ok(matrix
            .rows()
            .map(|row| row_probability(row, &fitted.accuracies, fitted.class_balance))
            .collect())
    }

    /// Resolved label per row
    ///
    /// Rows whose probability is exactly balanced are settled by `tie_break`.
    pub fn predict(&mut self, matrix: &LabelMatrix, tie_break: TieBreak) -> Result<Vec<Vote>> {
        let probabilities = self.predict_proba(matrix)?;
        let fitted = match &mut self.state {
            State::Fitted(fitted) => fitted,
            State::Uninitialized => return Err(Error::NotFitted),
        };

        let mut ties = 0;
        let predictions = probabilities
            .into_iter()
            .map(|p| {
                if p > 0.5 + TIE_EPSILON {
                    Vote::Call
                } else if p < 0.5 - TIE_EPSILON {
                    Vote::NotCall
                } else {
                    ties += 1;
                    match tie_break {
                        TieBreak::Random => {
                            if fitted.rng.gen_bool(0.5) {
                                Vote::Call
                            } else {
                                Vote::NotCall
                            }
                        }
                        TieBreak::Abstain => Vote::Abstain,
                    }
                }
            })
            .collect();

        if ties > 0 {
            debug!("{} tied rows resolved with {:?} policy", ties, tie_break);
        }

        Ok(predictions)
    }

    /// Score predictions for `matrix` against aligned ground truth
    ///
    /// # Errors
    /// `Error::NotFitted` before fit, `Error::Configuration` when the
    /// ground truth is not aligned with the matrix.
    pub fn score(
        &mut self,
        matrix: &LabelMatrix,
        gold: &[Label],
        tie_break: TieBreak,
        metrics: &[Metric],
    ) -> Result<BTreeMap<Metric, f64>> {
        self.fitted()?;
        if gold.len() != matrix.n_rows() {
            return Err(Error::Configuration(format!(
                "evaluation ground truth has {} labels for {} rows",
                gold.len(),
                matrix.n_rows()
            )));
        }

        let predictions = self.predict(matrix, tie_break)?;
        let confusion = Confusion::tally(&predictions, gold);
        let coverage = matrix.coverage();

        Ok(metrics
            .iter()
            .map(|m| (*m, metrics::metric_value(*m, &confusion, coverage)))
            .collect())
    }

    /// Learned per-voter parameters, in column order
    pub fn weights(&self) -> Result<Vec<VoterWeight>> {
        let fitted = self.fitted()?;
        Ok(fitted
            .columns
            .iter()
            .enumerate()
            .map(|(j, name)| {
                let partner = fitted.correlations[j]
                    .iter()
                    .enumerate()
                    .filter(|(k, _)| *k != j)
                    .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()));
                let (most_correlated, correlation) = match partner {
                    Some((k, r)) if *r != 0.0 => (Some(fitted.columns[k].clone()), *r),
                    _ => (None, 0.0),
                };
                VoterWeight {
                    name: name.clone(),
                    accuracy: fitted.accuracies[j],
                    weight: log_odds(fitted.accuracies[j]),
                    coverage: fitted.coverage[j],
                    most_correlated,
                    correlation,
                }
            })
            .collect())
    }

    /// Estimated P(CALL)
    pub fn class_balance(&self) -> Result<f64> {
        Ok(self.fitted()?.class_balance)
    }

    /// EM iterations actually run by the last fit
    pub fn epochs_run(&self) -> Result<usize> {
        Ok(self.fitted()?.epochs_run)
    }

    /// Pairwise vote correlations (column order)
    pub fn correlations(&self) -> Result<&[Vec<f64>]> {
        Ok(&self.fitted()?.correlations)
    }
}

fn clamp_accuracy(value: f64) -> f64 {
    value.clamp(ACCURACY_FLOOR, ACCURACY_CEIL)
}

fn log_odds(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn label_probability(label: Label) -> f64 {
    match label {
        Label::Call => 1.0,
        Label::NotCall => 0.0,
    }
}

/// Posterior P(CALL) for one row under the one-coin model
fn row_probability(row: &[Vote], accuracies: &[f64], class_balance: f64) -> f64 {
    let mut logit = log_odds(class_balance);
    for (vote, accuracy) in row.iter().zip(accuracies) {
        match vote {
            Vote::Call => logit += log_odds(*accuracy),
            Vote::NotCall => logit -= log_odds(*accuracy),
            Vote::Abstain => {}
        }
    }
    sigmoid(logit)
}

/// Smoothed fraction of voter `j`'s cast votes that match the gold label
fn empirical_accuracy(train: &LabelMatrix, j: usize, gold: &[Label]) -> f64 {
    let mut correct = 0.0;
    let mut cast = 0.0;
    for (vote, truth) in train.column(j).zip(gold) {
        if let Some(label) = vote.label() {
            cast += 1.0;
            if label == *truth {
                correct += 1.0;
            }
        }
    }
    (correct + PRIOR_ACCURACY * PRIOR_STRENGTH) / (cast + PRIOR_STRENGTH)
}

/// Pearson correlation of ±1 votes over rows where both voters voted
fn vote_correlations(matrix: &LabelMatrix) -> Vec<Vec<f64>> {
    let n = matrix.n_cols();
    let mut out = vec![vec![0.0; n]; n];
    for j in 0..n {
        out[j][j] = 1.0;
        for k in (j + 1)..n {
            let pairs: Vec<(f64, f64)> = matrix
                .column(j)
                .zip(matrix.column(k))
                .filter_map(|(a, b)| Some((signed(a)?, signed(b)?)))
                .collect();
            let r = pearson(&pairs);
            out[j][k] = r;
            out[k][j] = r;
        }
    }
    out
}

fn signed(vote: Vote) -> Option<f64> {
    match vote {
        Vote::Call => Some(1.0),
        Vote::NotCall => Some(-1.0),
        Vote::Abstain => None,
    }
}

/// 0.0 for fewer than two points or zero variance
fn pearson(pairs: &[(f64, f64)]) -> f64 {
    if pairs.len() < 2 {
        return 0.0;
    }
    let n = pairs.len() as f64;
    let mean_a = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_b = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (a, b) in pairs {
        cov += (a - mean_a) * (b - mean_b);
        var_a += (a - mean_a).powi(2);
        var_b += (b - mean_b).powi(2);
    }
    if var_a == 0.0 || var_b == 0.0 {
        0.0
    } else {
        cov / (var_a.sqrt() * var_b.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: Vec<Vec<i8>>) -> LabelMatrix {
        let width = rows.first().map(|r| r.len()).unwrap_or(0);
        let columns = (0..width).map(|j| format!("lf_{}", j)).collect();
        let rows = rows
            .into_iter()
            .map(|r| r.into_iter().map(|v| Vote::from_i8(v).unwrap()).collect())
            .collect();
        LabelMatrix::from_rows(columns, rows).unwrap()
    }

    /// Three voters: two good ones that agree, one that votes at random-ish
    fn agreeing_matrix() -> LabelMatrix {
        matrix(vec![
            vec![1, 1, -1],
            vec![1, 1, 0],
            vec![0, 0, 1],
            vec![0, 0, -1],
            vec![1, 1, 1],
            vec![0, 0, 0],
            vec![1, -1, -1],
            vec![-1, 0, 1],
        ])
    }

    #[test]
    fn test_new_rejects_other_cardinalities() {
        assert!(LabelModel::new(2).is_ok());
        assert!(matches!(LabelModel::new(3), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_queries_before_fit_fail() {
        let mut model = LabelModel::new(2).unwrap();
        let l = agreeing_matrix();
        assert!(matches!(model.predict(&l, TieBreak::Random), Err(Error::NotFitted)));
        assert!(matches!(model.predict_proba(&l), Err(Error::NotFitted)));
        assert!(matches!(
            model.score(&l, &[Label::Call; 8], TieBreak::Random, &Metric::ALL),
            Err(Error::NotFitted)
        ));
        assert!(matches!(model.weights(), Err(Error::NotFitted)));
    }

    #[test]
    fn test_fit_rejects_zero_columns() {
        let mut model = LabelModel::default();
        let empty = LabelMatrix::from_rows(vec![], vec![vec![], vec![]]).unwrap();
        let err = model.fit(&empty, None, FitOptions::default()).unwrap_err();
        assert!(matches!(err, Error::ModelFit(_)));
        assert!(!model.is_fitted());
    }

    #[test]
    fn test_fit_rejects_zero_rows() {
        let mut model = LabelModel::default();
        let empty = LabelMatrix::from_rows(vec!["a".to_string()], vec![]).unwrap();
        assert!(matches!(
            model.fit(&empty, None, FitOptions::default()),
            Err(Error::ModelFit(_))
        ));
    }

    #[test]
    fn test_fit_rejects_misaligned_ground_truth() {
        let mut model = LabelModel::default();
        let l = agreeing_matrix();
        assert!(matches!(
            model.fit(&l, Some(&[Label::Call]), FitOptions::default()),
            Err(Error::ModelFit(_))
        ));
    }

    #[test]
    fn test_same_seed_same_weights() {
        let l = agreeing_matrix();
        let mut a = LabelModel::default();
        let mut b = LabelModel::default();
        a.fit(&l, None, FitOptions::default()).unwrap();
        b.fit(&l, None, FitOptions::default()).unwrap();
        assert_eq!(a.weights().unwrap(), b.weights().unwrap());
        assert_eq!(a.predict_proba(&l).unwrap(), b.predict_proba(&l).unwrap());
    }

    #[test]
    fn test_agreeing_voters_learn_high_accuracy() {
        let l = agreeing_matrix();
        let mut model = LabelModel::default();
        model.fit(&l, None, FitOptions::default()).unwrap();

        let weights = model.weights().unwrap();
        assert!(weights[0].accuracy > weights[2].accuracy);
        assert!(weights[1].accuracy > weights[2].accuracy);
        assert_eq!(weights[0].most_correlated.as_deref(), Some("lf_1"));

        let predictions = model.predict(&l, TieBreak::Random).unwrap();
        assert_eq!(predictions[0], Vote::Call);
        assert_eq!(predictions[3], Vote::NotCall);
    }

    #[test]
    fn test_abstain_is_not_evidence_for_notcall() {
        // A row of only abstains sits at the class balance, not below it
        let l = matrix(vec![vec![1, 1], vec![0, 0], vec![-1, -1]]);
        let mut model = LabelModel::default();
        model.fit(&l, None, FitOptions::default()).unwrap();

        let proba = model.predict_proba(&l).unwrap();
        let balance = model.class_balance().unwrap();
        assert!((proba[2] - balance).abs() < 1e-12);
    }

    #[test]
    fn test_supervised_fit_uses_ground_truth() {
        // lf_0 is right on every row, lf_1 is wrong on every row
        let l = matrix(vec![vec![1, 0], vec![0, 1], vec![1, 0], vec![0, 1]]);
        let gold = [Label::Call, Label::NotCall, Label::Call, Label::NotCall];
        let mut model = LabelModel::default();
        model.fit(&l, Some(&gold), FitOptions::default()).unwrap();

        let weights = model.weights().unwrap();
        assert!(weights[0].weight > 0.0);
        assert!(weights[1].weight < 0.0);
        assert!((model.class_balance().unwrap() - 0.5).abs() < 1e-12);

        let scores = model
            .score(&l, &gold, TieBreak::Random, &Metric::ALL)
            .unwrap();
        assert_eq!(scores[&Metric::Accuracy], 1.0);
        assert_eq!(scores[&Metric::Coverage], 1.0);
    }

    #[test]
    fn test_tie_break_policies() {
        // One voter each way with mirrored supervision: every row ties
        let l = matrix(vec![vec![-1], vec![-1], vec![1], vec![0]]);
        let gold = [Label::Call, Label::NotCall, Label::Call, Label::NotCall];
        let mut model = LabelModel::default();
        model.fit(&l, Some(&gold), FitOptions::default()).unwrap();

        let uncovered = matrix(vec![vec![-1], vec![-1], vec![-1]]);
        let abstained = model.predict(&uncovered, TieBreak::Abstain).unwrap();
        assert!(abstained.iter().all(|v| *v == Vote::Abstain));

        let random = model.predict(&uncovered, TieBreak::Random).unwrap();
        assert!(random.iter().all(|v| !v.is_abstain()));
    }

    #[test]
    fn test_random_tie_break_is_seeded() {
        let l = matrix(vec![vec![-1], vec![1], vec![0]]);
        let gold = [Label::Call, Label::Call, Label::NotCall];
        let uncovered = matrix(vec![vec![-1]; 16]);

        let run = || {
            let mut model = LabelModel::default();
            let options = FitOptions {
                seed: 42,
                ..FitOptions::default()
            };
            model.fit(&l, Some(&gold), options).unwrap();
            model.predict(&uncovered, TieBreak::Random).unwrap()
        };
        // Class balance 2/3 means uncovered rows are not ties here
        assert_eq!(run(), run());
    }

    #[test]
    fn test_score_coverage_matches_matrix() {
        let l = matrix(vec![vec![1, -1], vec![-1, -1], vec![0, 0], vec![-1, -1]]);
        let gold = [Label::Call, Label::Call, Label::NotCall, Label::NotCall];
        let mut model = LabelModel::default();
        model.fit(&l, Some(&gold), FitOptions::default()).unwrap();

        let scores = model
            .score(&l, &gold, TieBreak::Random, &[Metric::Coverage])
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[&Metric::Coverage], 0.5);
    }

    #[test]
    fn test_eval_matrix_with_other_columns_rejected() {
        let l = agreeing_matrix();
        let mut model = LabelModel::default();
        model.fit(&l, None, FitOptions::default()).unwrap();

        let other = LabelMatrix::from_rows(vec!["x".to_string()], vec![vec![Vote::Call]]).unwrap();
        assert!(matches!(model.predict_proba(&other), Err(Error::ModelFit(_))));
    }

    #[test]
    fn test_pearson_degenerate_inputs() {
        assert_eq!(pearson(&[]), 0.0);
        assert_eq!(pearson(&[(1.0, 1.0), (1.0, -1.0)]), 0.0);
        assert!((pearson(&[(1.0, 1.0), (-1.0, -1.0)]) - 1.0).abs() < 1e-12);
    }
}
