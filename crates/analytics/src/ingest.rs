//! JSON Lines loader for raw customer records.

use retention_core::types::CustomerRecord;
use retention_core::{RetentionError, RetentionResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::info;

/// Parse one customer object per line. Blank lines are skipped; the first
/// malformed line aborts the load with its 1-based line number.
pub fn read_records<R: BufRead>(reader: R) -> RetentionResult<Vec<CustomerRecord>> {
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: CustomerRecord =
            serde_json::from_str(&line).map_err(|e| RetentionError::Ingest {
                line: line_no,
                message: e.to_string(),
            })?;
        record.validate()?;
        records.push(record);
    }
    Ok(records)
}

pub fn load_jsonl(path: &Path) -> RetentionResult<Vec<CustomerRecord>> {
    let file = File::open(path)?;
    let records = read_records(BufReader::new(file))?;
    metrics::counter!("pipeline.records_ingested").increment(records.len() as u64);
    info!(path = %path.display(), records = records.len(), "Raw customer records loaded");
    Ok(records)
}
