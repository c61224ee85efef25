//! GOCAD PLine emitter: one `GOCAD PLine 1` object per block of the merged
//! document, colored from the feature-class table, with the block metadata
//! spread over `*metadata*` header fields.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cursor::{starts_numeric, LineCursor};
use crate::summary::RunSummary;
use crate::tables::{ColorTable, Rgb};

use super::meta_field;

/// What `GEOLOGICAL_FEATURE` groups the emitted PLines under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    /// Group by flight line (`.mdc`).
    LineId,
    /// Group by feature class, with fault classes typed (`.mdch`).
    Class,
}

impl Feature {
    pub fn extension(self) -> &'static str {
        match self {
            Feature::LineId => "mdc",
            Feature::Class => "mdch",
        }
    }
}

const META_KEYS: [&str; 19] = [
    "Type",
    "BoundaryNm",
    "BoundConf",
    "BasisOfInt",
    "OvrStrtUnt",
    "OvrStrtCod",
    "OvrConf",
    "UndStrtUnt",
    "UndStrtCod",
    "UndConf",
    "WithinType",
    "WithinStrt",
    "WithinStNo",
    "WithinConf",
    "InterpRef",
    "Comment",
    "Annotation",
    "NewObs",
    "Operator",
];

const COORD_SYSTEM: &str = "\
GOCAD_ORIGINAL_COORDINATE_SYSTEM
NAME \" gocad Local\"
PROJECTION \" GDA94 / MGA zone 53\"
DATUM \" Mean Sea Level\"
AXIS_NAME X Y Z
AXIS_UNIT m m m
ZPOSITIVE Elevation
END_ORIGINAL_COORDINATE_SYSTEM
";

/// Parsed merged-document vertex row: the seven value columns plus the
/// vertex number assigned by the merge.
fn parse_row(row: &str) -> Option<([f64; 7], i64)> {
    let f: Vec<&str> = row.split_whitespace().collect();
    if f.len() < 11 {
        return None;
    }
    let mut vals = [0.0; 7];
    for (slot, tok) in vals.iter_mut().zip(&f[0..7]) {
        *slot = tok.parse().ok()?;
    }
    let vtx: i64 = f[9].parse().ok()?;
    Some((vals, vtx))
}

/// Emit `SORT/{nm}.mdc` (or `.mdch`) from `SORT/{nm}.gmts`.
pub fn write_gocad(
    work_dir: &Path,
    nm: &str,
    colors: &ColorTable,
    feature: Feature,
    summary: &mut RunSummary,
) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let input = srt_dir.join(format!("{nm}.gmts"));
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading merged document {}", input.display()))?;

    let mut out = String::new();
    let mut cursor = LineCursor::new(&text);
    while let Some(line) = cursor.advance() {
        if !line.contains("@D") {
            continue;
        }
        let line = line.to_string();
        let met: Vec<&str> = line.split('|').collect();
        let class = meta_field(&met, 1).to_string();
        if met.len() < 20 {
            warn!("{nm}: metadata record for {class:?} is short ({} fields)", met.len());
            summary.short_metadata += 1;
        }

        // The block's first vertex row carries the segment number and the
        // starting vertex index used for the edge list.
        let Some(first_row) = cursor.peek().map(str::to_string) else {
            warn!("{nm}: block {class:?} has no vertex rows, skipped");
            continue;
        };
        let Some((vals, frst)) = parse_row(&first_row) else {
            warn!("{nm}: block {class:?} has no vertex rows, skipped");
            continue;
        };
        let segn = first_row
            .split_whitespace()
            .nth(8)
            .unwrap_or("")
            .to_string();
        cursor.advance();

        let rgb = match colors.get(&class) {
            Some(rgb) => rgb,
            None => {
                warn!("{nm}: no color for class {class:?}, using black");
                summary.lookup_misses += 1;
                Rgb { r: 0.0, g: 0.0, b: 0.0 }
            }
        };

        out.push_str("GOCAD PLine 1\nHEADER {\n");
        let _ = writeln!(out, "name:{nm}_{segn}_{class}");
        out.push_str("*atoms:false\n");
        match feature {
            Feature::LineId => {
                let _ = writeln!(out, "*line*color:{:.6} {:.6} {:.6} 1", rgb.r, rgb.g, rgb.b);
            }
            Feature::Class => {
                let _ = writeln!(out, "*line*color: {:.6} {:.6} {:.6} 1", rgb.r, rgb.g, rgb.b);
            }
        }
        out.push_str("use_feature_color: false\n");
        out.push_str(match feature {
            Feature::LineId => "width:5\n",
            Feature::Class => "width: 5\n",
        });
        let _ = writeln!(out, "*metadata*Line: {nm}");
        for (i, key) in META_KEYS.iter().enumerate() {
            let _ = writeln!(out, "*metadata*{key}: {}", meta_field(&met, i + 1));
        }
        out.push_str("*metadata*Organization: Geoscience Australia\n}\n");
        out.push_str("PROPERTIES px py gl depth\n");
        out.push_str(COORD_SYSTEM);
        match feature {
            Feature::LineId => {
                let _ = writeln!(out, "GEOLOGICAL_FEATURE {nm}");
            }
            Feature::Class => {
                let _ = writeln!(out, "GEOLOGICAL_FEATURE {class}");
                if class.contains("fault") {
                    out.push_str("GEOLOGICAL_TYPE fault\n");
                }
            }
        }
        out.push_str("ILINE\n");

        let mut last = push_vertex(&mut out, &vals, frst);
        while let Some((vals, vtx)) = cursor.peek().and_then(parse_row) {
            cursor.advance();
            last = push_vertex(&mut out, &vals, vtx);
        }
        // Trailing junk inside the block is dropped, not mis-read as data.
        while cursor.peek().is_some_and(|l| starts_numeric(l) && parse_row(l).is_none()) {
            let junk = cursor.advance().unwrap_or_default().to_string();
            warn!("{nm}: malformed vertex row skipped: {junk}");
        }

        for i in frst..last {
            let _ = writeln!(out, "seg {i} {}", i + 1);
        }
        out.push_str("END\n");
    }

    let output = srt_dir.join(format!("{nm}.{}", feature.extension()));
    fs::write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

fn push_vertex(out: &mut String, v: &[f64; 7], vtx: i64) -> i64 {
    let _ = writeln!(
        out,
        "PVRTX {vtx} {:6.1} {:7.1} {:.1} {:.6} {:.6} {:.1} {:.1}",
        v[2], v[3], v[4], v[0], v[1], v[5], v[6]
    );
    vtx
}
