//! Merge of the per-class companion files back into one ordered document
//! per flight line, plus materialization of the depth-corrected document as
//! a shapefile through the external converter.

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::ogr;
use crate::summary::RunSummary;

/// Merge sorted companion contents under a shared header.
///
/// Vertex numbering restarts at 1 at every `>` sentinel; the segment number
/// restarts per companion file and increments at each sentinel. Sentinel and
/// metadata lines pass through verbatim, vertex rows get ` {vtx} {seg}`
/// appended, blank lines are dropped without consuming a vertex number.
pub fn merge_companions(header: &str, companions: &[(String, String)]) -> String {
    let mut out = String::from(header);
    for (_, text) in companions {
        let mut seg = 0usize;
        let mut vtx = 1usize;
        let mut lines = text.lines();
        while let Some(line) = lines.next() {
            if line.starts_with('>') {
                seg += 1;
                vtx = 1;
                out.push_str(line);
                out.push('\n');
                if let Some(meta) = lines.next() {
                    out.push_str(meta);
                    out.push('\n');
                }
            } else if !line.is_empty() {
                out.push_str(line);
                out.push_str(&format!(" {vtx} {seg}\n"));
                vtx += 1;
            }
        }
    }
    out
}

/// Merge one line's companions into `SORT/{nm}.gmts`.
///
/// Annotation companions are working notes, not geometry; they are deleted
/// before the merge so they can never leak into exports.
pub fn merge_line(work_dir: &Path, nm: &str) -> Result<()> {
    let srt_dir = work_dir.join("SORT");

    let prefix = format!("{nm}_");
    let mut companions = Vec::new();
    for entry in fs::read_dir(&srt_dir)
        .with_context(|| format!("reading {}", srt_dir.display()))?
    {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(".srt") {
            continue;
        }
        if name.ends_with("Annotations.srt") {
            fs::remove_file(entry.path())
                .with_context(|| format!("removing {}", name))?;
            continue;
        }
        let text = fs::read_to_string(entry.path())
            .with_context(|| format!("reading companion {}", name))?;
        companions.push((name, text));
    }
    companions.sort_by(|a, b| a.0.cmp(&b.0));
    if companions.is_empty() {
        bail!("line {nm}: no companion files to merge");
    }

    let hdr_path = srt_dir.join(format!("{nm}_hdr.hdr"));
    let header = fs::read_to_string(&hdr_path)
        .with_context(|| format!("reading header {}", hdr_path.display()))?;

    let merged = merge_companions(&header, &companions);
    let out_path = srt_dir.join(format!("{nm}.gmts"));
    fs::write(&out_path, merged)
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!(
        "line {nm}: merged {} companion files into {}",
        companions.len(),
        out_path.display()
    );
    Ok(())
}

/// Convert `SORT/{nm}zf.gmtf` into `{shp_dir}/{nm}_zf.shp`. A converter
/// failure is an error; a clean exit that leaves no output file is only
/// counted as an anomaly.
pub fn materialize_shapefile(
    work_dir: &Path,
    shp_dir: &Path,
    nm: &str,
    summary: &mut RunSummary,
) -> Result<()> {
    fs::create_dir_all(shp_dir)?;
    let input = work_dir.join("SORT").join(format!("{nm}zf.gmtf"));
    let output = shp_dir.join(format!("{nm}_zf.shp"));
    ogr::convert("ESRI Shapefile", &output, &input)?;
    if !output.is_file() {
        warn!("line {nm}: converter reported success but {} is missing", output.display());
        summary.missing_outputs += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_numbers_vertices_and_segments() {
        let header = "# HDR\n".to_string();
        let a = "\
>
# @D0|Base|
 0.1 0.2 1 0
 0.3 0.4 2 0
>
# @D0|Base|
 0.5 0.6 1 1
"
        .to_string();
        let b = "\
>
# @D0|Top|
 0.7 0.8 1 2
"
        .to_string();
        let merged = merge_companions(
            &header,
            &[("100_Base.srt".into(), a), ("100_Top.srt".into(), b)],
        );
        let expected = "\
# HDR
>
# @D0|Base|
 0.1 0.2 1 0 1 1
 0.3 0.4 2 0 2 1
>
# @D0|Base|
 0.5 0.6 1 1 1 2
>
# @D0|Top|
 0.7 0.8 1 2 1 1
";
        assert_eq!(merged, expected);
    }

    #[test]
    fn blank_lines_do_not_consume_vertex_numbers() {
        let header = "# HDR\n".to_string();
        let a = "\
>
# @D0|Base|
 0.1 0.2 1 0

 0.3 0.4 2 0
"
        .to_string();
        let merged = merge_companions(&header, &[("100_Base.srt".into(), a)]);
        let expected = "\
# HDR
>
# @D0|Base|
 0.1 0.2 1 0 1 1
 0.3 0.4 2 0 2 1
";
        assert_eq!(merged, expected);
    }

    #[test]
    fn merge_line_sorts_and_drops_annotations() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("SORT");
        fs::create_dir_all(&srt).unwrap();
        fs::write(srt.join("100_hdr.hdr"), "# HDR\n").unwrap();
        fs::write(srt.join("100_Top.srt"), ">\n# @D0|Top|\n 1 2 1 0\n").unwrap();
        fs::write(srt.join("100_Base.srt"), ">\n# @D0|Base|\n 3 4 1 1\n").unwrap();
        fs::write(srt.join("100_Annotations.srt"), ">\n# @D0|Annotations|\n").unwrap();

        merge_line(dir.path(), "100").unwrap();

        assert!(!srt.join("100_Annotations.srt").exists());
        let merged = fs::read_to_string(srt.join("100.gmts")).unwrap();
        let expected = "\
# HDR
>
# @D0|Base|
 3 4 1 1 1 1
>
# @D0|Top|
 1 2 1 0 1 1
";
        assert_eq!(merged, expected);
    }

    #[test]
    fn merge_line_without_companions_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("SORT")).unwrap();
        assert!(merge_line(dir.path(), "100").is_err());
    }
}
