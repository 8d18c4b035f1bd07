//! Label matrix and its builder
//!
//! Rows are records in dataset order, columns are the active labeling
//! functions in registry order. Application is embarrassingly parallel:
//! rows are computed across rayon workers and reassembled in input order,
//! so the result is identical with or without parallelism.

use rayon::prelude::*;
use sbws_common::{Error, Record, Result, Vote};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::lfs::ActiveSet;

/// Records × voters grid of votes (row-major)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelMatrix {
    columns: Vec<String>,
    n_rows: usize,
    votes: Vec<Vote>,
}

impl LabelMatrix {
    /// Build from explicit rows
    ///
    /// # Errors
    /// `Error::ModelFit` when a row's width differs from the column count.
    pub fn from_rows(columns: Vec<String>, rows: Vec<Vec<Vote>>) -> Result<Self> {
        let n_rows = rows.len();
        let mut votes = Vec::with_capacity(n_rows * columns.len());
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(Error::ModelFit(format!(
                    "row {} has {} votes, expected {}",
                    i,
                    row.len(),
                    columns.len()
                )));
            }
            votes.extend(row);
        }
        Ok(Self {
            columns,
            n_rows,
            votes,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Labeling function names, one per column
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn get(&self, row: usize, col: usize) -> Vote {
        self.votes[row * self.n_cols() + col]
    }

    pub fn row(&self, row: usize) -> &[Vote] {
        let width = self.n_cols();
        &self.votes[row * width..(row + 1) * width]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Vote]> + '_ {
        (0..self.n_rows).map(move |i| self.row(i))
    }

    pub fn column(&self, col: usize) -> impl Iterator<Item = Vote> + '_ {
        (0..self.n_rows).map(move |row| self.get(row, col))
    }

    /// At least one voter did not abstain on this row
    pub fn is_covered(&self, row: usize) -> bool {
        self.row(row).iter().any(|v| !v.is_abstain())
    }

    /// Fraction of rows with at least one non-abstain vote
    pub fn coverage(&self) -> f64 {
        if self.n_rows == 0 {
            return 0.0;
        }
        let covered = (0..self.n_rows).filter(|i| self.is_covered(*i)).count();
        covered as f64 / self.n_rows as f64
    }

    /// Rows as raw `{-1, 0, 1}` values
    pub fn to_i8_rows(&self) -> Vec<Vec<i8>> {
        self.rows()
            .map(|row| row.iter().map(|v| v.as_i8()).collect())
            .collect()
    }

    /// SHA-256 over column names and vote bytes
    ///
    /// Two matrices with equal fingerprints are byte-identical.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for name in &self.columns {
            hasher.update(name.as_bytes());
            hasher.update([0u8]);
        }
        hasher.update((self.n_rows as u64).to_le_bytes());
        hasher.update(self.votes.iter().map(|v| v.as_i8() as u8).collect::<Vec<u8>>());
        format!("{:x}", hasher.finalize())
    }
}

/// Applies every active labeling function to every record
pub struct MatrixBuilder {
    active: ActiveSet,
    parallel: bool,
}

impl MatrixBuilder {
    pub fn new(active: ActiveSet) -> Self {
        Self {
            active,
            parallel: true,
        }
    }

    /// Toggle rayon parallelism (output is the same either way)
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn active(&self) -> &ActiveSet {
        &self.active
    }

    /// Vote matrix for `records`
    pub fn build(&self, records: &[Record]) -> LabelMatrix {
        let functions = self.active.functions();
        let width = functions.len();

        let apply = |record: &Record| -> Vec<Vote> {
            functions.iter().map(|lf| lf.vote(record)).collect()
        };

        let votes: Vec<Vote> = if self.parallel {
            records.par_iter().flat_map_iter(apply).collect()
        } else {
            records.iter().flat_map(apply).collect()
        };

        debug!(
            "Built label matrix: {} records x {} labeling functions (parallel={})",
            records.len(),
            width,
            self.parallel
        );

        LabelMatrix {
            columns: self.active.names(),
            n_rows: records.len(),
            votes,
        }
    }
}
