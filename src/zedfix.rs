//! Depth correction ("zedfix"): re-projects every interpreted vertex onto
//! real-world coordinates via the flight path, reconciles its depth against
//! the per-line pixel-to-depth affine, and re-emits the document together
//! with per-class companion files and catalog entries.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::document::SegmentedDocument;
use crate::interp::interpolate;
use crate::summary::RunSummary;
use crate::tables::{ExtentRecord, PathTable};

/// Corrected vertex row. Clamped rows carry two leading spaces per value,
/// free rows one; downstream formats rely on that spacing.
fn push_row(buf: &mut String, lead: &str, vals: [f64; 7], vtx: usize, block: usize) {
    for v in vals {
        let _ = write!(buf, "{lead}{v:.6}");
    }
    let _ = writeln!(buf, " {vtx} {block}");
}

/// Ground-profile value: space-signed fixed formatting with trailing zeros
/// (and a bare trailing dot) stripped.
fn profile_value(v: f64) -> String {
    let s = if v >= 0.0 {
        format!(" {v:.6}")
    } else {
        format!("{v:.6}")
    };
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Remove this line's companion and header artifacts from a previous run so
/// the merge only ever sees what the current run produced.
fn clear_line_artifacts(srt_dir: &Path, nm: &str) -> Result<()> {
    let prefix = format!("{nm}_");
    for entry in fs::read_dir(srt_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with(&prefix) && (name.ends_with(".srt") || name.ends_with(".hdr")) {
            fs::remove_file(entry.path())
                .with_context(|| format!("removing stale {}", name))?;
        }
    }
    Ok(())
}

/// Correct one flight line's interpreted document.
///
/// Reads `interp/{nm}_interp.gmt`, writes `SORT/{nm}zf.gmtf`, the per-class
/// `SORT/{nm}_{class}.srt` companions and `SORT/{nm}_hdr.hdr`, and appends
/// every block's metadata line to the shared catalog.
pub fn correct_line(
    work_dir: &Path,
    nm: &str,
    path: &PathTable,
    extent: &ExtentRecord,
    catalog: &mut Catalog,
    summary: &mut RunSummary,
) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    fs::create_dir_all(&srt_dir)?;
    let y_scale = extent.y_scale()?;

    let gmt = work_dir.join("interp").join(format!("{nm}_interp.gmt"));
    let doc = SegmentedDocument::read(&gmt)?;
    info!("{} successfully read", doc.name);
    if doc.sentinel_mismatch() {
        warn!(
            "{}: {} blocks vs {} sentinels",
            doc.name,
            doc.blocks.len(),
            doc.sentinels
        );
        summary.sentinel_mismatches += 1;
    }

    clear_line_artifacts(&srt_dir, nm)?;

    let mut out = String::new();
    let mut hdr = String::new();
    for line in &doc.header {
        out.push_str(line);
        out.push('\n');
        hdr.push_str(line);
        hdr.push('\n');
    }
    fs::write(srt_dir.join(format!("{nm}_hdr.hdr")), hdr)?;

    let mut clamped = 0usize;

    for (block_idx, block) in doc.blocks.iter().enumerate() {
        catalog.append(&doc.name, block_idx, &block.metadata)?;
        let class = match block.feature_class() {
            Some(c) => c.to_string(),
            None => {
                warn!("{}: block {} metadata has no feature class", doc.name, block_idx);
                summary.short_metadata += 1;
                String::new()
            }
        };

        out.push_str(">\n");
        let _ = writeln!(out, "# {class}");
        out.push_str(&block.metadata);
        out.push('\n');

        let mut companion = String::from(">\n");
        companion.push_str(&block.metadata);
        companion.push('\n');

        for (i, v) in block.vertices.iter().enumerate() {
            let (x, y, t) = interpolate(v.c1, path);
            let depth = (v.c2 - extent.frame_top) * y_scale + extent.t_top;
            let mut row = String::new();
            if t <= depth {
                // Interpreted point sits below ground level: clamp elevation
                // to ground and move the pixel row to match.
                let nyp = v.c2 + (t - depth) / y_scale;
                push_row(&mut row, "  ", [v.c1, nyp, x, y, t, t, 0.0], i + 1, block_idx);
                clamped += 1;
            } else {
                push_row(
                    &mut row,
                    " ",
                    [v.c1, v.c2, x, y, depth, t, t - depth],
                    i + 1,
                    block_idx,
                );
            }
            out.push_str(&row);
            companion.push_str(&row);
        }

        // Stray non-vertex lines ride along with their block; the companions
        // carry geometry only.
        for extra in &block.trailing {
            out.push_str(extra);
            out.push('\n');
        }

        let srt_path = srt_dir.join(format!("{nm}_{class}.srt"));
        let mut srt = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&srt_path)
            .with_context(|| format!("opening companion {}", srt_path.display()))?;
        srt.write_all(companion.as_bytes())?;
    }

    // Synthetic trailing block: the ground-level profile across the whole
    // fiducial range, expressed in document (pixel) units.
    out.push_str(">\n");
    out.push_str("# @D0|DNDUTL|||||||||||||||||||||MAL|\n");
    let first = path.first();
    let last = path.last();
    for i in first..=last {
        let gl = path.points[(i - first) as usize].gl;
        let v = -(extent.t_top - gl) / y_scale;
        let _ = writeln!(out, "{i} {}", profile_value(v));
    }
    out.push_str(">\n");

    fs::write(srt_dir.join(format!("{nm}zf.gmtf")), out)?;
    info!("line {nm}: {clamped} vertices clamped to ground level");
    summary.clamped_to_ground += clamped;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PathPoint;

    fn test_path() -> PathTable {
        PathTable {
            points: vec![
                PathPoint {
                    fid: 1,
                    pix_x: 0.0,
                    pix_y: 0.0,
                    coord_x: 10.0,
                    coord_y: 100.0,
                    gl: 5.0,
                },
                PathPoint {
                    fid: 2,
                    pix_x: 1.0,
                    pix_y: 0.0,
                    coord_x: 20.0,
                    coord_y: 200.0,
                    gl: 15.0,
                },
            ],
        }
    }

    fn test_extent() -> ExtentRecord {
        ExtentRecord {
            nm: "100".into(),
            frame_left: 0.0,
            frame_top: 0.0,
            frame_right: 620.0,
            frame_bottom: 10.0,
            t_left: 0.0,
            t_top: 0.0,
            t_right: 620.0,
            t_bottom: -100.0,
        }
    }

    const DOC: &str = "\
# @VGMT1.0 @GLINESTRING
# FEATURE_DATA
>
# @D0|Base_Cenozoic|a|b|
0.5 -2.0
0.6 2.0
";

    fn run_once(work_dir: &Path) -> RunSummary {
        fs::create_dir_all(work_dir.join("interp")).unwrap();
        fs::create_dir_all(work_dir.join("SORT")).unwrap();
        fs::write(work_dir.join("interp/100_interp.gmt"), DOC).unwrap();
        let mut catalog = Catalog::open(&work_dir.join("SORT")).unwrap();
        let mut summary = RunSummary::default();
        correct_line(
            work_dir,
            "100",
            &test_path(),
            &test_extent(),
            &mut catalog,
            &mut summary,
        )
        .unwrap();
        summary
    }

    #[test]
    fn corrected_document_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let summary = run_once(dir.path());
        let zf = fs::read_to_string(dir.path().join("SORT/100zf.gmtf")).unwrap();
        let expected = "\
# @VGMT1.0 @GLINESTRING
# FEATURE_DATA
>
# Base_Cenozoic
# @D0|Base_Cenozoic|a|b|
  0.500000  -1.000000  15.000000  150.000000  10.000000  10.000000  0.000000 1 0
 0.600000 2.000000 16.000000 160.000000 -20.000000 11.000000 31.000000 2 0
>
# @D0|DNDUTL|||||||||||||||||||||MAL|
0 -0.5
1 -1.5
>
";
        assert_eq!(zf, expected);
        assert_eq!(summary.clamped_to_ground, 1);
    }

    #[test]
    fn companion_header_and_catalog() {
        let dir = tempfile::tempdir().unwrap();
        run_once(dir.path());
        let srt =
            fs::read_to_string(dir.path().join("SORT/100_Base_Cenozoic.srt")).unwrap();
        assert!(srt.starts_with(">\n# @D0|Base_Cenozoic|a|b|\n"));
        assert_eq!(srt.lines().count(), 4);

        let hdr = fs::read_to_string(dir.path().join("SORT/100_hdr.hdr")).unwrap();
        assert_eq!(hdr, "# @VGMT1.0 @GLINESTRING\n# FEATURE_DATA\n");

        let bdf = fs::read_to_string(dir.path().join("SORT/met.bdf")).unwrap();
        assert_eq!(bdf, "100_interp.gmt|0|# @D0|Base_Cenozoic|a|b|\n");
    }

    #[test]
    fn stray_lines_are_carried_with_their_block() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("interp")).unwrap();
        fs::create_dir_all(dir.path().join("SORT")).unwrap();
        let doc = "\
# @VGMT1.0 @GLINESTRING
>
# @D0|Base_Cenozoic|a|b|
0.6 2.0
# a stray remark
";
        fs::write(dir.path().join("interp/100_interp.gmt"), doc).unwrap();
        let mut catalog = Catalog::open(&dir.path().join("SORT")).unwrap();
        let mut summary = RunSummary::default();
        correct_line(
            dir.path(),
            "100",
            &test_path(),
            &test_extent(),
            &mut catalog,
            &mut summary,
        )
        .unwrap();

        let zf = fs::read_to_string(dir.path().join("SORT/100zf.gmtf")).unwrap();
        assert!(zf.contains(
            " 0.600000 2.000000 16.000000 160.000000 -20.000000 11.000000 31.000000 1 0\n\
             # a stray remark\n\
             >\n"
        ));
        // The stray line is not hoisted into the captured header.
        let hdr = fs::read_to_string(dir.path().join("SORT/100_hdr.hdr")).unwrap();
        assert_eq!(hdr, "# @VGMT1.0 @GLINESTRING\n");
        let srt =
            fs::read_to_string(dir.path().join("SORT/100_Base_Cenozoic.srt")).unwrap();
        assert!(!srt.contains("stray"));
    }

    #[test]
    fn rerun_is_idempotent_on_outputs() {
        let dir = tempfile::tempdir().unwrap();
        run_once(dir.path());
        let zf1 = fs::read_to_string(dir.path().join("SORT/100zf.gmtf")).unwrap();
        let srt1 =
            fs::read_to_string(dir.path().join("SORT/100_Base_Cenozoic.srt")).unwrap();
        run_once(dir.path());
        let zf2 = fs::read_to_string(dir.path().join("SORT/100zf.gmtf")).unwrap();
        let srt2 =
            fs::read_to_string(dir.path().join("SORT/100_Base_Cenozoic.srt")).unwrap();
        assert_eq!(zf1, zf2);
        assert_eq!(srt1, srt2);
    }

    #[test]
    fn profile_value_strips_trailing_zeros() {
        assert_eq!(profile_value(-0.5), "-0.5");
        assert_eq!(profile_value(5.0), " 5");
        assert_eq!(profile_value(0.0), " 0");
        assert_eq!(profile_value(1.25), " 1.25");
    }
}
