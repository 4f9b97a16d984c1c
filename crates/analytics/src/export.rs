//! JSON Lines export of the derived tables.

use retention_core::RetentionResult;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::store::DerivedSnapshot;

pub const SEGMENTATION_TABLE: &str = "customer_segmentation";
pub const ANALYTICS_TABLE: &str = "customer_analytics";

#[derive(Debug, Clone)]
pub struct ExportPaths {
    pub segmentation: PathBuf,
    pub analytics: PathBuf,
}

/// Write both tables under `dir`. Each file is staged as `*.tmp` and the
/// renames happen only after both tables are fully written.
pub fn export_snapshot(dir: &Path, snapshot: &DerivedSnapshot) -> RetentionResult<ExportPaths> {
    fs::create_dir_all(dir)?;

    let paths = ExportPaths {
        segmentation: dir.join(format!("{SEGMENTATION_TABLE}.jsonl")),
        analytics: dir.join(format!("{ANALYTICS_TABLE}.jsonl")),
    };
    let seg_tmp = paths.segmentation.with_extension("jsonl.tmp");
    let analytics_tmp = paths.analytics.with_extension("jsonl.tmp");

    write_jsonl(&seg_tmp, &snapshot.segmentation)?;
    write_jsonl(&analytics_tmp, &snapshot.analytics)?;
    fs::rename(&seg_tmp, &paths.segmentation)?;
    fs::rename(&analytics_tmp, &paths.analytics)?;

    info!(
        run_id = %snapshot.run_id,
        dir = %dir.display(),
        rows = snapshot.analytics.len(),
        "Derived tables exported"
    );
    Ok(paths)
}

pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> RetentionResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(())
}
