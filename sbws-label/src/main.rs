//! sbws-label - Main entry point
//!
//! Loads a training and an evaluation dataset, runs the labeling functions
//! and the label model over them, and prints the run outcome as JSON on
//! stdout. Logs go to stderr.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use sbws_common::config::{load_config, resolve_config_source, TomlConfig};
use sbws_common::{dataset, Error, TieBreak};
use sbws_label::{orchestrator, RunOptions, RunOutcome};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for sbws-label
#[derive(Parser, Debug)]
#[command(name = "sbws-label")]
#[command(about = "Weak-supervision label aggregation for scambait videos")]
#[command(version)]
struct Args {
    /// Training records (JSON array or JSON Lines)
    train: PathBuf,

    /// Evaluation records (JSON array or JSON Lines)
    eval: PathBuf,

    /// Config file (overrides SBWS_CONFIG and the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Labeling function to leave out (repeatable)
    #[arg(short = 'x', long = "exclude", value_name = "NAME")]
    exclude: Vec<String>,

    /// Fit the label model without training labels
    #[arg(long)]
    no_ground_truth: bool,

    /// Annotation field to derive labels from (empty string keeps record labels)
    #[arg(long)]
    label_field: Option<String>,

    /// Seed for initialisation and random tie-breaks
    #[arg(long)]
    seed: Option<u64>,

    /// Maximum fitting epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Tie-break policy: random or abstain
    #[arg(long)]
    tie_break: Option<TieBreak>,

    /// Apply labeling functions on one thread
    #[arg(long)]
    sequential: bool,

    /// Abandon the run after this many seconds
    #[arg(long, env = "SBWS_FIT_TIMEOUT_SECS")]
    fit_timeout_secs: Option<u64>,
}

impl Args {
    /// Command-line flags take precedence over the config file
    fn apply_to(&self, config: &mut TomlConfig) {
        config.excluded_lfs.extend(self.exclude.iter().cloned());
        if self.no_ground_truth {
            config.ground_truth = false;
        }
        if let Some(field) = &self.label_field {
            config.label_field = Some(field.clone());
        }
        if let Some(seed) = self.seed {
            config.model.seed = seed;
        }
        if let Some(epochs) = self.epochs {
            config.model.epochs = epochs;
        }
        if let Some(tie_break) = self.tie_break {
            config.model.tie_break = tie_break;
        }
        if self.sequential {
            config.parallel = false;
        }
        if self.fit_timeout_secs.is_some() {
            config.fit_timeout_secs = self.fit_timeout_secs;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config =
        load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply_to(&mut config);

    // Initialize tracing (RUST_LOG wins over the config level)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "Configuration source: {:?}",
        resolve_config_source(args.config.as_deref())
    );

    match execute(&args, &config).await {
        Ok(outcome) => {
            let json = serde_json::to_string_pretty(&outcome)
                .context("Failed to serialize run outcome")?;
            println!("{}", json);
            Ok(())
        }
        Err(err) => match err.downcast_ref::<Error>() {
            Some(sbws_err) => {
                warn!("Run failed: {:#}", err);
                let body = serde_json::json!({
                    "error": {
                        "kind": sbws_err.kind(),
                        "message": format!("{:#}", err),
                    }
                });
                println!("{}", body);
                std::process::exit(1);
            }
            None => Err(err),
        },
    }
}

async fn execute(args: &Args, config: &TomlConfig) -> Result<RunOutcome> {
    let train = dataset::load_records(&args.train)
        .with_context(|| format!("Failed to load training records from {}", args.train.display()))?;
    let eval = dataset::load_records(&args.eval)
        .with_context(|| format!("Failed to load evaluation records from {}", args.eval.display()))?;
    info!("Loaded {} training and {} evaluation records", train.len(), eval.len());

    let options = RunOptions::from(config);

    let outcome = match config.fit_timeout_secs {
        Some(secs) => {
            orchestrator::run_with_timeout(train, eval, options, Duration::from_secs(secs)).await?
        }
        None => orchestrator::run(train, eval, &options)?,
    };

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "sbws-label",
            "train.json",
            "eval.json",
            "--exclude",
            "hacking",
            "-x",
            "small_video",
            "--no-ground-truth",
            "--seed",
            "7",
            "--tie-break",
            "abstain",
            "--sequential",
        ]);
        let mut config = TomlConfig::default();
        config.excluded_lfs = vec!["live_stream".to_string()];
        args.apply_to(&mut config);

        assert_eq!(config.excluded_lfs, vec!["live_stream", "hacking", "small_video"]);
        assert!(!config.ground_truth);
        assert_eq!(config.model.seed, 7);
        assert_eq!(config.model.epochs, 500);
        assert_eq!(config.model.tie_break, TieBreak::Abstain);
        assert!(!config.parallel);
    }

    #[test]
    fn test_unknown_tie_break_rejected() {
        let result = Args::try_parse_from([
            "sbws-label",
            "train.json",
            "eval.json",
            "--tie-break",
            "coinflip",
        ]);
        assert!(result.is_err());
    }
}
