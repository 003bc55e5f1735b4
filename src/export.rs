//! # Export
//!
//! Writes a [`ScanResult`] as a flat CSV table or as JSON keyed by alias.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Result, ScoutError};
use crate::matching::ScanResult;

const CSV_HEADER: &str = "Video,Target Alias,Start Time (s),End Time (s),Start Frame,End Frame";

/// Render the result as CSV, one row per range
pub fn to_csv(result: &ScanResult) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');

    for (alias, ranges) in result.iter() {
        for found in ranges {
            out.push_str(&format!(
                "{},{},{:.2},{:.2},{},{}\n",
                csv_field(&found.video),
                csv_field(alias),
                found.range.start_time,
                found.range.end_time,
                found.range.start_frame,
                found.range.end_frame
            ));
        }
    }

    out
}

pub fn write_csv<P: AsRef<Path>>(result: &ScanResult, path: P) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, to_csv(result))?;
    info!("Exported {} ranges to {}", result.total_ranges(), path.display());
    Ok(())
}

pub fn write_json<P: AsRef<Path>>(result: &ScanResult, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, result)
        .map_err(|e| ScoutError::generic(format!("Failed to serialize results: {}", e)))?;
    writer.flush()?;
    info!("Exported {} ranges to {}", result.total_ranges(), path.display());
    Ok(())
}

/// Load results previously written by [`write_json`]
pub fn read_json<P: AsRef<Path>>(path: P) -> Result<ScanResult> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| ScoutError::generic(format!("Invalid results file {}: {}", path.display(), e)))
}

fn csv_field(value: &str) -> String {
    if value.contains(|c: char| matches!(c, ',' | '"' | '\n' | '\r')) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
