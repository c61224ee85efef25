//! Append-only metadata catalog (`met.bdf`): one pipe-delimited record per
//! block encountered across the whole run, consumed by downstream QC.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub struct Catalog {
    file: File,
    path: PathBuf,
}

impl Catalog {
    /// Open (or create) `met.bdf` under the SORT directory for appending.
    pub fn open(srt_dir: &Path) -> Result<Self> {
        let path = srt_dir.join("met.bdf");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("opening catalog {}", path.display()))?;
        Ok(Self { file, path })
    }

    pub fn append(&mut self, source: &str, block_index: usize, raw_metadata: &str) -> Result<()> {
        writeln!(self.file, "{source}|{block_index}|{raw_metadata}")
            .with_context(|| format!("appending to catalog {}", self.path.display()))
    }
}
