//! End-of-run accounting: per-kind anomaly counters, printed to the console
//! and written as a date-stamped JSON report in the work directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Debug, Default, Serialize)]
pub struct RunSummary {
    /// Flight lines fully processed.
    pub lines_ok: usize,
    /// Flight lines skipped after a per-line fatal error.
    pub lines_failed: usize,
    /// Vertices clamped to ground level during depth correction.
    pub clamped_to_ground: usize,
    /// Documents whose sentinel count did not match their block count.
    pub sentinel_mismatches: usize,
    /// Color or age lookups that fell back to the default value.
    pub lookup_misses: usize,
    /// Metadata records shorter than the emitter's field layout.
    pub short_metadata: usize,
    /// Converter runs that succeeded but left no output file.
    pub missing_outputs: usize,
}

impl RunSummary {
    pub fn print(&self) {
        println!(
            "Lines: {} ok, {} failed. Clamped vertices: {}.",
            self.lines_ok, self.lines_failed, self.clamped_to_ground
        );
        println!(
            "Anomalies: {} sentinel mismatches, {} lookup misses, {} short metadata, {} missing converter outputs.",
            self.sentinel_mismatches, self.lookup_misses, self.short_metadata, self.missing_outputs
        );
    }

    /// Write the summary as JSON next to the run's outputs. Returns the path
    /// it was written to.
    pub fn write_json(&self, work_dir: &Path) -> Result<PathBuf> {
        let stamp = chrono::Local::now().format("%Y%m%d");
        let path = work_dir.join(format!("aemflow_summary_{stamp}.json"));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("writing summary {}", path.display()))?;
        Ok(path)
    }
}
