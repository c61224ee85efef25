//! Re-coloring passes over the interpolated section groups (`.s2`): swap the
//! placeholder line colors for the feature-class palette and emit the
//! flavor-specific GOCAD variants, plus the viewer XML descriptor.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cursor::LineCursor;
use crate::exports::meta_field;
use crate::summary::RunSummary;
use crate::tables::{ColorTable, Rgb};

/// Plain re-color (`.gp`) or the 2017 single-object layout (`.pl17`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    Gp,
    Pl17,
}

impl Style {
    pub fn extension(self) -> &'static str {
        match self {
            Style::Gp => "gp",
            Style::Pl17 => "pl17",
        }
    }
}

/// Metadata-carrying re-color: horizon grouping (`.hmdc`) or per-section
/// grouping (`.smdc`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaStyle {
    Horizon,
    Section,
}

impl MetaStyle {
    pub fn extension(self) -> &'static str {
        match self {
            MetaStyle::Horizon => "hmdc",
            MetaStyle::Section => "smdc",
        }
    }
}

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

const META_KEYS: [&str; 23] = [
    "Type",
    "BoundConf",
    "ContactTyp",
    "BasisOfInt",
    "OvrStrtUnt",
    "OvrStratNo",
    "OvrConf",
    "UndStrtUnt",
    "UndStratNo",
    "UndConf",
    "WithinStrt",
    "WithinStNo",
    "WithinConf",
    "HydStrtType",
    "HydStrConf",
    "BOMNAFUnt",
    "BOMNAFNo",
    "InterpRef",
    "Comment",
    "Annotation",
    "NewObs",
    "Operator",
    "Date",
];

fn class_color(
    nm: &str,
    class: &str,
    colors: &ColorTable,
    summary: &mut RunSummary,
) -> Rgb {
    match colors.get(class) {
        Some(rgb) => rgb,
        None => {
            warn!("{nm}: no color for class {class:?}, using black");
            summary.lookup_misses += 1;
            Rgb { r: 0.0, g: 0.0, b: 0.0 }
        }
    }
}

/// Emit `SORT/{nm}.gp` or `SORT/{nm}.pl17` from `SORT/{nm}.s2`.
pub fn recolor_group(
    work_dir: &Path,
    nm: &str,
    colors: &ColorTable,
    style: Style,
    summary: &mut RunSummary,
) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let input = srt_dir.join(format!("{nm}.s2"));
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;

    let mut out = String::new();
    let mut cursor = LineCursor::new(&text);
    while let Some(line) = cursor.advance() {
        let line = line.to_string();
        if style == Style::Pl17 {
            if line.contains("GOCAD HomogeneousGroup 1") {
                // Group preamble through BEGIN_MEMBERS is dropped.
                cursor.skip(5);
                continue;
            }
            if line.contains("END_MEMBERS") {
                break;
            }
        }
        if !line.contains("GOCAD PLine 1") {
            out.push_str(&line);
            out.push('\n');
            continue;
        }
        out.push_str(&line);
        out.push('\n');
        // HEADER { and the name line, read for the class lookup.
        let mut class = String::new();
        for _ in 0..2 {
            if let Some(next) = cursor.advance() {
                if let Some((_, name)) = next.split_once(':') {
                    class = name.trim().to_string();
                }
                out.push_str(next);
                out.push('\n');
            }
        }
        if let Some(atoms) = cursor.advance() {
            out.push_str(atoms);
            out.push('\n');
        }
        let rgb = class_color(nm, &class, colors, summary);
        let _ = writeln!(out, "*line*color:{:.6} {:.6} {:.6} 1", rgb.r, rgb.g, rgb.b);
        cursor.skip(1); // placeholder color
        if style == Style::Pl17 {
            out.push_str("use_feature_color: false\n");
            for _ in 0..2 {
                if let Some(next) = cursor.advance() {
                    out.push_str(next);
                    out.push('\n');
                }
            }
            out.push_str(COORD_SYSTEM);
            let _ = writeln!(out, "GEOLOGICAL_FEATURE {nm}_AEM_interp");
        }
    }

    let output = srt_dir.join(format!("{nm}.{}", style.extension()));
    fs::write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Emit `SORT/{nm}.hmdc` or `SORT/{nm}.smdc` from `SORT/{nm}.s2`: the group
/// structure is flattened into one fully-annotated PLine object per segment.
pub fn recolor_with_metadata(
    work_dir: &Path,
    nm: &str,
    colors: &ColorTable,
    style: MetaStyle,
    summary: &mut RunSummary,
) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let input = srt_dir.join(format!("{nm}.s2"));
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading {}", input.display()))?;

    let mut out = String::new();
    let mut cursor = LineCursor::new(&text);
    let mut seg = 1usize;
    while let Some(line) = cursor.advance() {
        let line = line.to_string();
        if line.contains("GOCAD HomogeneousGroup 1") {
            cursor.skip(5);
            continue;
        }
        if line == "END" {
            continue;
        }
        if line.contains("GOCAD PLine 1") {
            // Placeholder PLine header through PROPERTIES.
            cursor.skip(7);
            continue;
        }
        if line.contains("END_MEMBERS") {
            cursor.skip(1);
            continue;
        }
        if !line.contains("ILINE") {
            out.push_str(&line);
            out.push('\n');
            continue;
        }

        let meta = cursor.advance().unwrap_or_default().trim_end().to_string();
        let met: Vec<&str> = meta.split('|').collect();
        let class = meta_field(&met, 1).to_string();
        if met.len() < 24 {
            warn!("{nm}: metadata record for {class:?} is short ({} fields)", met.len());
            summary.short_metadata += 1;
        }
        let rgb = class_color(nm, &class, colors, summary);

        if seg > 1 {
            out.push_str("END\n");
        }
        out.push_str("GOCAD PLine 1\nHEADER {\n");
        let _ = writeln!(out, "name:{nm}_{seg}_{class}");
        out.push_str("*atoms:false\n");
        let _ = writeln!(out, "*line*color:{:.6} {:.6} {:.6} 1", rgb.r, rgb.g, rgb.b);
        out.push_str("use_feature_color: false\nwidth:5\n");
        let _ = writeln!(out, "*metadata*Line: {nm}");
        for (i, key) in META_KEYS.iter().enumerate() {
            let _ = writeln!(out, "*metadata*{key}: {}", meta_field(&met, i + 1));
        }
        out.push_str("*metadata*Organization: Geoscience Australia\n}\n");
        out.push_str("PROPERTIES px py gl depth\n");
        out.push_str(COORD_SYSTEM);
        match style {
            MetaStyle::Horizon => {
                let _ = writeln!(out, "GEOLOGICAL_FEATURE {class}");
                if class.contains("fault") {
                    out.push_str("GEOLOGICAL_TYPE fault\n");
                }
            }
            MetaStyle::Section => {
                let _ = writeln!(out, "GEOLOGICAL_FEATURE {nm}");
            }
        }
        out.push_str("ILINE\n");
        seg += 1;
    }
    out.push_str("END\n");

    let output = srt_dir.join(format!("{nm}.{}", style.extension()));
    fs::write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

/// Viewer descriptor for one line's `.gp` file.
pub fn write_xml(work_dir: &Path, nm: &str) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str("<Layer version=\"1\" layerType=\"ModelLayer\">\n");
    let _ = writeln!(out, "<DisplayName>{nm} Interp</DisplayName>");
    let _ = writeln!(out, "<URL>{nm}.gp</URL>");
    out.push_str("<DataFormat>GOCAD</DataFormat>\n");
    out.push_str("<LineWidth>5</LineWidth>\n");
    let _ = writeln!(out, "<DataCacheName>GA/EFTF/AEM/{nm}.gp</DataCacheName>");
    out.push_str("<CoordinateSystem>EPSG:28353</CoordinateSystem>\n");
    out.push_str("</Layer>\n");

    let output = srt_dir.join(format!("{nm}.xml"));
    fs::write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}
