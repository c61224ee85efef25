//! Section-group pipeline: split the interpreted documents into per-class
//! ASCII records, assemble those into per-line GOCAD HomogeneousGroup files
//! with pixel rows mapped to depth, then re-project every vertex onto the
//! flight path.

use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cursor::LineCursor;
use crate::document::SegmentedDocument;
use crate::interp::interpolate;
use crate::summary::RunSummary;
use crate::tables::{ExtentTable, PathTable};

/// Break every `interp/*_interp.gmt` document into per-class record files
/// `SORT/{prefix}_{class}.asc`. Annotation classes are working notes and are
/// removed once all documents are split.
pub fn split_classes(work_dir: &Path, summary: &mut RunSummary) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    fs::create_dir_all(&srt_dir)?;
    let interp_dir = work_dir.join("interp");

    let mut gmt_files = Vec::new();
    for entry in fs::read_dir(&interp_dir)
        .with_context(|| format!("reading {}", interp_dir.display()))?
    {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.ends_with("_interp.gmt") {
            gmt_files.push(path);
        }
    }
    gmt_files.sort();

    for gmt in &gmt_files {
        let doc = SegmentedDocument::read(gmt)?;
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
        let prefix = doc.name.split('_').next().unwrap_or(&doc.name).to_string();

        for (block_idx, block) in doc.blocks.iter().enumerate() {
            let Some(class) = block.feature_class() else {
                warn!("{}: block {} metadata has no feature class", doc.name, block_idx);
                summary.short_metadata += 1;
                continue;
            };
            let mut record = format!("{class}\n{}\n170 170 0\n{}\n", block.metadata, block.vertices.len());
            for v in &block.vertices {
                record.push_str(&v.raw);
                record.push('\n');
            }
            let asc_path = srt_dir.join(format!("{prefix}_{class}.asc"));
            let mut asc = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&asc_path)
                .with_context(|| format!("opening {}", asc_path.display()))?;
            asc.write_all(record.as_bytes())?;
        }
    }

    for entry in fs::read_dir(&srt_dir)? {
        let path = entry?.path();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if name.ends_with("Annotations.asc") {
            fs::remove_file(&path)
                .with_context(|| format!("removing {}", name))?;
        }
    }
    Ok(())
}

/// One record of a per-class `.asc` file.
struct AscRecord {
    class: String,
    metadata: String,
    rgb: [f64; 3],
    vertices: Vec<(f64, f64)>,
}

fn read_asc_records(path: &Path) -> Result<Vec<AscRecord>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut cursor = LineCursor::new(&text);
    let mut records = Vec::new();
    while let Some(class_line) = cursor.advance() {
        let Some(class) = class_line.split_whitespace().next() else {
            break;
        };
        let class = class.to_string();
        let Some(metadata) = cursor.advance().map(str::to_string) else {
            break;
        };
        let mut rgb = [0.0; 3];
        let color_line = cursor.advance().unwrap_or_default().to_string();
        for (slot, tok) in rgb.iter_mut().zip(color_line.split_whitespace()) {
            *slot = tok.parse::<f64>().unwrap_or(0.0) / 255.0;
        }
        let n_vert: usize = cursor
            .advance()
            .and_then(|l| l.trim().parse().ok())
            .unwrap_or(0);
        let mut vertices = Vec::with_capacity(n_vert);
        for _ in 0..n_vert {
            let Some(row) = cursor.advance() else {
                // Input ended mid-record; keep what was read.
                break;
            };
            let mut it = row.split_whitespace();
            let px: Option<f64> = it.next().and_then(|t| t.parse().ok());
            let py: Option<f64> = it.next().and_then(|t| t.parse().ok());
            match (px, py) {
                (Some(px), Some(py)) => vertices.push((px, py)),
                _ => warn!("{}: malformed record row skipped: {row}", path.display()),
            }
        }
        records.push(AscRecord {
            class,
            metadata,
            rgb,
            vertices,
        });
    }
    Ok(records)
}

/// Assemble each line's `.asc` records into `SORT/{nm}.s1`, a GOCAD
/// HomogeneousGroup whose PVRTX rows carry pixel x and depth. Lines with no
/// records at all are dropped from the batch; the surviving ids are
/// returned in extent order.
pub fn pixel_to_depth(work_dir: &Path, extents: &ExtentTable) -> Result<Vec<String>> {
    let srt_dir = work_dir.join("SORT");
    fs::create_dir_all(&srt_dir)?;

    let mut kept = Vec::new();
    for record in &extents.records {
        let nm = &record.nm;
        let y_scale = record.y_scale()?;

        let prefix = format!("{nm}_");
        let mut asc_files = Vec::new();
        for entry in fs::read_dir(&srt_dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.starts_with(&prefix) && name.ends_with(".asc") {
                asc_files.push(path);
            }
        }
        asc_files.sort();
        if asc_files.is_empty() {
            info!("line {nm}: no class records, dropped from the batch");
            continue;
        }

        let mut out = String::new();
        let _ = write!(
            out,
            "GOCAD HomogeneousGroup 1\nHEADER {{\nname:{nm}_AEM_interp\n}}\nTYPE PLine\nBEGIN_MEMBERS\n"
        );

        let mut open_class: Option<String> = None;
        let mut i_nxt = 0usize;
        for asc in &asc_files {
            for rec in read_asc_records(asc)? {
                if open_class.as_deref() != Some(rec.class.as_str()) {
                    if open_class.is_some() {
                        out.push_str("END\n");
                    }
                    let _ = write!(
                        out,
                        "GOCAD PLine 1\nHEADER {{\nname:{}\n*atoms:false\n\
                         *line*color:{:.6} {:.6} {:.6} 1\nwidth:5\n}}\n\
                         PROPERTIES px py gl depth\n",
                        rec.class, rec.rgb[0], rec.rgb[1], rec.rgb[2]
                    );
                    open_class = Some(rec.class.clone());
                    i_nxt = 0;
                }
                out.push_str("ILINE\n");
                out.push_str(&rec.metadata);
                out.push('\n');
                let n = rec.vertices.len();
                for (k, (px, py)) in rec.vertices.iter().enumerate() {
                    let dpth = (py - record.frame_top) * y_scale + record.t_top;
                    let _ = writeln!(
                        out,
                        "PVRTX {} {px:.6} {py:.6} 0.000000 {px:.6} {dpth:.6}",
                        i_nxt + k + 1
                    );
                }
                for i in i_nxt + 1..i_nxt + n {
                    let _ = writeln!(out, "SEG {i} {}", i + 1);
                }
                i_nxt += n;
            }
        }
        out.push_str("END\nEND_MEMBERS\nEND\n");

        fs::write(srt_dir.join(format!("{nm}.s1")), out)?;
        kept.push(nm.clone());
    }
    Ok(kept)
}

/// Re-project `SORT/{nm}.s1` onto the flight path, writing `SORT/{nm}.s2`.
/// Non-vertex lines pass through verbatim.
pub fn interpolate_group(work_dir: &Path, nm: &str, path: &PathTable) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let input = srt_dir.join(format!("{nm}.s1"));
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;

    let mut out = String::new();
    for line in text.lines() {
        if !line.contains("PVRTX") {
            out.push_str(line);
            out.push('\n');
            continue;
        }
        let col: Vec<&str> = line.split_whitespace().collect();
        let parsed = (|| -> Option<(f64, f64, f64)> {
            Some((col.get(5)?.parse().ok()?, col.get(3)?.parse().ok()?, col.get(6)?.parse().ok()?))
        })();
        let (Some(id), Some((px, py, dpth))) = (col.get(1), parsed) else {
            warn!("{nm}: malformed vertex line skipped: {line}");
            continue;
        };
        let (x, y, t) = interpolate(px, path);
        let _ = writeln!(
            out,
            "PVRTX {id} {x:.6} {y:.6} {dpth:.6} {px:.6} {py:.6} {t:.6} {:.6}",
            dpth - t
        );
    }

    fs::write(srt_dir.join(format!("{nm}.s2")), out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::PathPoint;

    const DOC: &str = "\
# @VGMT1.0 @GLINESTRING
>
# @D0|Base_Cenozoic|a|b|
0.5 2.0
0.6 3.0
>
# @D0|Annotations|x|
1.0 1.0
>
# @D0|Base_Cenozoic|c|d|
0.7 4.0
";

    fn extent_table() -> ExtentTable {
        ExtentTable {
            records: vec![crate::tables::ExtentRecord {
                nm: "100".into(),
                frame_left: 0.0,
                frame_top: 0.0,
                frame_right: 620.0,
                frame_bottom: 10.0,
                t_left: 0.0,
                t_top: 0.0,
                t_right: 620.0,
                t_bottom: -100.0,
            }],
        }
    }

    #[test]
    fn split_appends_records_and_drops_annotations() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("interp")).unwrap();
        fs::write(dir.path().join("interp/100_interp.gmt"), DOC).unwrap();
        let mut summary = RunSummary::default();
        split_classes(dir.path(), &mut summary).unwrap();

        let asc =
            fs::read_to_string(dir.path().join("SORT/100_Base_Cenozoic.asc")).unwrap();
        let expected = "\
Base_Cenozoic
# @D0|Base_Cenozoic|a|b|
170 170 0
2
0.5 2.0
0.6 3.0
Base_Cenozoic
# @D0|Base_Cenozoic|c|d|
170 170 0
1
0.7 4.0
";
        assert_eq!(asc, expected);
        assert!(!dir.path().join("SORT/100_Annotations.asc").exists());
    }

    #[test]
    fn group_assembly_numbers_across_records() {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("SORT");
        fs::create_dir_all(&srt).unwrap();
        fs::write(
            srt.join("100_Base_Cenozoic.asc"),
            "\
Base_Cenozoic
# @D0|Base_Cenozoic|a|b|
170 170 0
2
0.5 2.0
0.6 3.0
Base_Cenozoic
# @D0|Base_Cenozoic|c|d|
170 170 0
1
0.7 4.0
",
        )
        .unwrap();
        fs::write(
            srt.join("100_Top_Basement.asc"),
            "\
Top_Basement
# @D0|Top_Basement|e|
170 170 0
1
0.8 5.0
",
        )
        .unwrap();

        let kept = pixel_to_depth(dir.path(), &extent_table()).unwrap();
        assert_eq!(kept, vec!["100".to_string()]);

        let s1 = fs::read_to_string(srt.join("100.s1")).unwrap();
        assert!(s1.starts_with(
            "GOCAD HomogeneousGroup 1\nHEADER {\nname:100_AEM_interp\n}\nTYPE PLine\nBEGIN_MEMBERS\n"
        ));
        assert!(s1.contains("*line*color:0.666667 0.666667 0.000000 1\n"));
        // First record: vertices 1..2, one edge.
        assert!(s1.contains("PVRTX 1 0.500000 2.000000 0.000000 0.500000 -20.000000\n"));
        assert!(s1.contains("PVRTX 2 0.600000 3.000000 0.000000 0.600000 -30.000000\n"));
        assert!(s1.contains("SEG 1 2\n"));
        // Second record of the same class continues the numbering.
        assert!(s1.contains("PVRTX 3 0.700000 4.000000 0.000000 0.700000 -40.000000\n"));
        // Class change closes the object and restarts numbering.
        assert!(s1.contains("END\nGOCAD PLine 1\nHEADER {\nname:Top_Basement\n"));
        assert!(s1.contains("PVRTX 1 0.800000 5.000000 0.000000 0.800000 -50.000000\n"));
        assert!(s1.ends_with("END\nEND_MEMBERS\nEND\n"));
    }

    #[test]
    fn lines_without_records_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("SORT")).unwrap();
        let kept = pixel_to_depth(dir.path(), &extent_table()).unwrap();
        assert!(kept.is_empty());
        assert!(!dir.path().join("SORT/100.s1").exists());
    }

    #[test]
    fn group_vertices_are_reprojected() {
        let path = PathTable {
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
        };
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("SORT");
        fs::create_dir_all(&srt).unwrap();
        fs::write(
            srt.join("100.s1"),
            "ILINE\nPVRTX 1 0.600000 2.000000 0.000000 0.600000 -20.000000\nSEG 1 2\n",
        )
        .unwrap();
        interpolate_group(dir.path(), "100", &path).unwrap();
        let s2 = fs::read_to_string(srt.join("100.s2")).unwrap();
        assert_eq!(
            s2,
            "ILINE\n\
             PVRTX 1 16.000000 160.000000 -20.000000 0.600000 2.000000 11.000000 -31.000000\n\
             SEG 1 2\n"
        );
    }
}
