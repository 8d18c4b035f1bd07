//! Dataset loading
//!
//! Datasets are ordered record collections serialized either as one JSON
//! array or as JSON Lines (one record per line). Every record is validated
//! on load, so a malformed record fails the load instead of reaching a voter.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::record::Record;
use crate::{Error, Result};

/// Load an ordered dataset from a JSON array or JSON Lines file
///
/// # Errors
/// * `Error::Io` - file cannot be read
/// * `Error::Json` - content is not valid JSON for [`Record`]
/// * `Error::VoterInput` - a record violates the schema invariants
pub fn load_records(path: &Path) -> Result<Vec<Record>> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_records(&content)?;
    info!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}

/// Parse records from JSON array or JSON Lines text
pub fn parse_records(content: &str) -> Result<Vec<Record>> {
    let trimmed = content.trim_start();

    let records: Vec<Record> = if trimmed.starts_with('[') {
        debug!("Parsing dataset as JSON array");
        serde_json::from_str(trimmed)?
    } else {
        debug!("Parsing dataset as JSON Lines");
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(n, line)| {
                serde_json::from_str::<Record>(line).map_err(|e| {
                    warn!("Malformed record on line {}: {}", n + 1, e);
                    Error::Json(e)
                })
            })
            .collect::<Result<_>>()?
    };

    for record in &records {
        record.validate()?;
    }

    Ok(records)
}

/// Write a dataset as a pretty JSON array
pub fn save_records(path: &Path, records: &[Record]) -> Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(path, json)?;
    Ok(())
}
