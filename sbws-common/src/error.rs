//! Common error types for SBWS

use thiserror::Error;

/// Common result type for SBWS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the label pipeline
///
/// A voter that lacks optional data (e.g. no transcript) is not an error:
/// it abstains. Everything here aborts the run; there is no partial result.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed record handed to the pipeline (caller bug)
    #[error("Voter input error: {0}")]
    VoterInput(String),

    /// Degenerate label matrix or inconsistent fit inputs
    #[error("Model fit error: {0}")]
    ModelFit(String),

    /// Label model queried before a successful fit
    #[error("Label model has not been fitted")]
    NotFitted,

    /// Contradictory or unusable orchestration options
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Run exceeded its time budget; the worker was abandoned
    #[error("Run timed out after {0} seconds")]
    Timeout(u64),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Dataset (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML config parse error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Stable machine-readable kind, used in structured error output
    pub fn kind(&self) -> &'static str {
        match self {
            Error::VoterInput(_) => "VOTER_INPUT",
            Error::ModelFit(_) => "MODEL_FIT",
            Error::NotFitted => "NOT_FITTED",
            Error::Configuration(_) => "CONFIGURATION",
            Error::Timeout(_) => "TIMEOUT",
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::Toml(_) => "TOML_ERROR",
        }
    }
}
