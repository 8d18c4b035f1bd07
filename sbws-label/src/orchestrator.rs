//! Run orchestration
//!
//! One run: derive labels → select labeling functions → build train/eval
//! matrices → fit the label model → score and predict the eval set.
//!
//! The registry is built per run, so concurrent runs share no state.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sbws_common::config::{TomlConfig, DEFAULT_LABEL_FIELD};
use sbws_common::{Error, Label, Record, Result, TieBreak, Vote};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::{self, LfSummary};
use crate::lfs::Registry;
use crate::matrix::MatrixBuilder;
use crate::model::{FitOptions, LabelModel, Metric, VoterWeight, CARDINALITY};

// ============================================================================
// Options
// ============================================================================

/// Derives a record's label from one of its annotation fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelRule {
    pub field: String,
}

impl Default for LabelRule {
    fn default() -> Self {
        Self {
            field: DEFAULT_LABEL_FIELD.to_string(),
        }
    }
}

impl LabelRule {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }

    /// CALL when the field is truthy; missing or null fields are NOTCALL
    pub fn derive(&self, record: &Record) -> Label {
        Label::from_truthy(record.annotation(&self.field).map_or(false, is_truthy))
    }
}

/// JSON truthiness: `true`, non-zero numbers, non-empty strings/arrays/objects
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |x| x != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

/// Options for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    /// Overwrite record labels from an annotation field; `None` keeps them
    pub label_rule: Option<LabelRule>,
    pub excluded_lfs: Vec<String>,
    /// Fit with training labels
    pub ground_truth: bool,
    pub fit: FitOptions,
    pub tie_break: TieBreak,
    /// Apply labeling functions across rayon workers
    pub parallel: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            label_rule: Some(LabelRule::default()),
            excluded_lfs: Vec::new(),
            ground_truth: true,
            fit: FitOptions::default(),
            tie_break: TieBreak::default(),
            parallel: true,
        }
    }
}

impl From<&TomlConfig> for RunOptions {
    fn from(config: &TomlConfig) -> Self {
        Self {
            label_rule: config
                .label_field
                .as_deref()
                .filter(|field| !field.is_empty())
                .map(LabelRule::new),
            excluded_lfs: config.excluded_lfs.clone(),
            ground_truth: config.ground_truth,
            fit: FitOptions::from(&config.model),
            tie_break: config.model.tie_break,
            parallel: config.parallel,
        }
    }
}

// ============================================================================
// Outcome
// ============================================================================

/// Everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Labeling functions applied, in column order
    pub active_lfs: Vec<String>,
    pub metrics: BTreeMap<Metric, f64>,
    /// Resolved eval labels, in dataset order
    pub predictions: Vec<Vote>,
    pub weights: Vec<VoterWeight>,
    /// Per-voter diagnostics on the training matrix
    pub analysis: Vec<LfSummary>,
    pub train_fingerprint: String,
    pub eval_fingerprint: String,
}

// ============================================================================
// Run
// ============================================================================

/// Apply a label rule (if any) and collect labels
///
/// Returns `None` when any record is left without a label, or when a rule
/// is set but no record carries its field (no label column to derive from).
fn collect_labels(records: &mut [Record], rule: Option<&LabelRule>) -> Option<Vec<Label>> {
    if let Some(rule) = rule {
        if !records.is_empty() && records.iter().all(|r| r.annotation(&rule.field).is_none()) {
            debug!("No record carries label field '{}'", rule.field);
            return None;
        }
        for record in records.iter_mut() {
            record.label = Some(rule.derive(record));
        }
    }
    records.iter().map(|r| r.label).collect()
}

/// Execute one full run
///
/// # Errors
/// - `Error::VoterInput`: a record violates the schema invariants
/// - `Error::Configuration`: ground truth requested but training labels
///   missing, eval labels missing, or no labeling function left active
/// - `Error::ModelFit`: degenerate training matrix
pub fn run(mut train: Vec<Record>, mut eval: Vec<Record>, options: &RunOptions) -> Result<RunOutcome> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    info!(
        "Starting run {}: {} train / {} eval records",
        run_id,
        train.len(),
        eval.len()
    );

    for record in train.iter().chain(eval.iter()) {
        record.validate()?;
    }

    // Phase 1: labels
    let rule = options.label_rule.as_ref();
    let train_labels = collect_labels(&mut train, rule);
    let eval_labels = collect_labels(&mut eval, rule).ok_or_else(|| {
        Error::Configuration("evaluation records need labels for scoring".to_string())
    })?;

    let fit_labels = if options.ground_truth {
        Some(train_labels.ok_or_else(|| {
            Error::Configuration(
                "ground truth requested but some training records have no label".to_string(),
            )
        })?)
    } else {
        None
    };

    // Phase 2: labeling functions
    let registry = Registry::standard()?;
    let active = registry.excluding(&options.excluded_lfs);
    if active.is_empty() {
        return Err(Error::Configuration(
            "no labeling functions remain after exclusions".to_string(),
        ));
    }
    let active_lfs = active.names();
    debug!("Active labeling functions: {:?}", active_lfs);

    // Phase 3: matrices
    let builder = MatrixBuilder::new(active).with_parallelism(options.parallel);
    let l_train = builder.build(&train);
    let l_eval = builder.build(&eval);
    let train_fingerprint = l_train.fingerprint();
    let eval_fingerprint = l_eval.fingerprint();
    debug!(
        "Matrices built: train {} ({:.3} coverage), eval {} ({:.3} coverage)",
        &train_fingerprint[..12],
        l_train.coverage(),
        &eval_fingerprint[..12],
        l_eval.coverage()
    );

    // Phase 4: model
    let mut model = LabelModel::new(CARDINALITY)?;
    model.fit(&l_train, fit_labels.as_deref(), options.fit)?;

    // Same rng state for both, so random tie-breaks agree
    let predictions = model.clone().predict(&l_eval, options.tie_break)?;
    let metrics = model.score(&l_eval, &eval_labels, options.tie_break, &Metric::ALL)?;
    let weights = model.weights()?;
    let analysis = analysis::summarize(&l_train, fit_labels.as_deref());

    let finished_at = Utc::now();
    info!(
        "Run {} finished in {} ms: accuracy {:.3}, coverage {:.3}",
        run_id,
        (finished_at - started_at).num_milliseconds(),
        metrics.get(&Metric::Accuracy).copied().unwrap_or_default(),
        metrics.get(&Metric::Coverage).copied().unwrap_or_default()
    );

    Ok(RunOutcome {
        run_id,
        started_at,
        finished_at,
        active_lfs,
        metrics,
        predictions,
        weights,
        analysis,
        train_fingerprint,
        eval_fingerprint,
    })
}

/// Execute [`run`] on the blocking pool, abandoning it after `limit`
///
/// The abandoned worker keeps running to completion; its result is dropped.
pub async fn run_with_timeout(
    train: Vec<Record>,
    eval: Vec<Record>,
    options: RunOptions,
    limit: Duration,
) -> Result<RunOutcome> {
    let handle = tokio::task::spawn_blocking(move || run(train, eval, &options));

    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(Error::ModelFit(format!(
            "run worker failed: {}",
            join_error
        ))),
        Err(_) => Err(Error::Timeout(limit.as_secs())),
    }
}
