//! CSV export of normalized records.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::record::{COLUMNS, NormalizedRecord};

/// Header row for a target: the common columns followed by its extras.
pub fn header(extra_columns: &[&str]) -> Vec<String> {
    COLUMNS
        .iter()
        .chain(extra_columns)
        .map(|c| c.to_string())
        .collect()
}

/// Write `records` as CSV to `writer`, header first, in input order.
///
/// Returns the number of data rows written.
pub fn write_csv<'a, W, I>(writer: W, extra_columns: &[&str], records: I) -> Result<usize>
where
    W: Write,
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    let header = header(extra_columns);
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv_writer.write_record(&header)?;

    let mut rows = 0;
    for record in records {
        csv_writer.write_record(record.row(&header))?;
        rows += 1;
    }
    csv_writer.flush()?;
    Ok(rows)
}

/// Write `records` to a CSV file at `path`, replacing any previous export.
pub fn export_csv<'a, I>(path: &Path, extra_columns: &[&str], records: I) -> Result<usize>
where
    I: IntoIterator<Item = &'a NormalizedRecord>,
{
    if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let rows = write_csv(file, extra_columns, records)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), rows, "Exported CSV");
    Ok(rows)
}
