//! # SBWS Common Library
//!
//! Shared code for the scambait weak-supervision pipeline:
//! - Record schema (videos, diarized transcripts, votes, labels)
//! - Error taxonomy
//! - Dataset loading
//! - Configuration loading

pub mod config;
pub mod dataset;
pub mod error;
pub mod record;

pub use config::{TieBreak, TomlConfig};
pub use error::{Error, Result};
pub use record::{DiarizedSegment, Label, Record, Vote, COMMENTS_DISABLED};
