//! sbws-label library interface
//!
//! Labeling functions, the label matrix, the generative label model and
//! the run orchestrator. Exposed as a library for integration testing.

pub mod analysis;
pub mod lfs;
pub mod matrix;
pub mod model;
pub mod orchestrator;

pub use crate::lfs::{ActiveSet, Category, LabelingFunction, Registry};
pub use crate::matrix::{LabelMatrix, MatrixBuilder};
pub use crate::model::{FitOptions, LabelModel, Metric, VoterWeight};
pub use crate::orchestrator::{run, run_with_timeout, LabelRule, RunOptions, RunOutcome};
