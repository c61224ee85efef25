//! Invocation of the external vector-format converter (GDAL's ogr2ogr).
//! Treated as a black box: format name, output path, input path.

use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{error, info, warn};

use crate::summary::RunSummary;

pub fn ogr_binary() -> &'static str {
    if cfg!(windows) {
        "ogr2ogr.exe"
    } else {
        "ogr2ogr"
    }
}

/// Run the converter. A non-zero exit is an error; whether the declared
/// output file actually exists afterwards is the caller's concern.
pub fn convert(format: &str, output: &Path, input: &Path) -> Result<()> {
    if !input.is_file() {
        bail!("converter input is not a file: {}", input.display());
    }
    let status = Command::new(ogr_binary())
        .arg("-f")
        .arg(format)
        .arg(output)
        .arg(input)
        .status()
        .with_context(|| format!("spawning {}", ogr_binary()))?;
    if !status.success() {
        bail!(
            "{} -f {:?} {} {} exited with {status}",
            ogr_binary(),
            format,
            output.display(),
            input.display()
        );
    }
    info!("converted {} -> {}", input.display(), output.display());
    Ok(())
}

/// Import every interpreted shapefile (`*_interp_*.shp`) from `shp_dir` as
/// `interp/{prefix}_interp.gmt`, where the prefix is the flight line id.
/// A failed conversion skips that file and the batch continues.
pub fn import_shapefiles(
    shp_dir: &Path,
    work_dir: &Path,
    summary: &mut RunSummary,
) -> Result<Vec<String>> {
    let interp_dir = work_dir.join("interp");
    fs::create_dir_all(&interp_dir)?;

    let mut shp_files = Vec::new();
    for entry in fs::read_dir(shp_dir)
        .with_context(|| format!("reading shapefile directory {}", shp_dir.display()))?
    {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.contains("_interp_") && name.ends_with(".shp") {
            shp_files.push(path);
        }
    }
    shp_files.sort();

    let mut imported = Vec::new();
    for shp in &shp_files {
        let stem = shp
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let prefix = stem.split('_').next().unwrap_or(&stem).to_string();
        let out = interp_dir.join(format!("{prefix}_interp.gmt"));
        match convert("GMT", &out, shp) {
            Ok(()) if out.is_file() => imported.push(prefix),
            Ok(()) => {
                warn!("{}: converter reported success but {} is missing", stem, out.display());
                summary.missing_outputs += 1;
            }
            Err(e) => {
                error!("{stem}: {e:#}");
                summary.lines_failed += 1;
            }
        }
    }
    Ok(imported)
}
