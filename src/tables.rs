//! Loaders for the tabular side inputs: sampled flight paths, frame/time
//! extents, and the two feature-class lookup tables (.prn).

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{bail, Context, Result};
use regex::Regex;

/// The .prn lookups are fixed-width-ish: columns are separated by runs of
/// two or more spaces, single spaces belong to the value.
static PRN_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// One sample of the flown path. `fid` is the fiducial id; `fid - 1` is the
/// position coordinate used for interpolation.
#[derive(Debug, Clone, Copy)]
pub struct PathPoint {
    pub fid: i64,
    pub pix_x: f64,
    pub pix_y: f64,
    pub coord_x: f64,
    pub coord_y: f64,
    pub gl: f64,
}

/// Sampled path for one flight line, ascending fiducial order.
///
/// Loading rejects non-contiguous fiducial ids: the interpolator brackets by
/// indexing the sample list directly from the position value, which is only
/// defined for unit spacing.
#[derive(Debug, Clone)]
pub struct PathTable {
    pub points: Vec<PathPoint>,
}

impl PathTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading path table {}", path.display()))?;
        let mut points = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.is_empty() {
                continue;
            }
            if f.len() < 9 {
                bail!(
                    "{}: line {}: expected 9 fields, got {}",
                    path.display(),
                    i + 1,
                    f.len()
                );
            }
            let parse = |s: &str, what: &str| -> Result<f64> {
                s.parse::<f64>()
                    .with_context(|| format!("{}: line {}: bad {what} {s:?}", path.display(), i + 1))
            };
            points.push(PathPoint {
                fid: f[1]
                    .parse::<i64>()
                    .with_context(|| format!("{}: line {}: bad fiducial id", path.display(), i + 1))?,
                pix_x: parse(f[2], "pixel x")?,
                pix_y: parse(f[3], "pixel y")?,
                coord_x: parse(f[4], "coordinate x")?,
                coord_y: parse(f[5], "coordinate y")?,
                gl: parse(f[8], "ground level")?,
            });
        }
        if points.len() < 2 {
            bail!("{}: need at least two path samples", path.display());
        }
        for (i, w) in points.windows(2).enumerate() {
            if w[1].fid != w[0].fid + 1 {
                bail!(
                    "{}: fiducial ids must be contiguous, found {} after {} (sample {})",
                    path.display(),
                    w[1].fid,
                    w[0].fid,
                    i + 1
                );
            }
        }
        Ok(Self { points })
    }

    /// Position of the first sample (`fid - 1`).
    pub fn first(&self) -> i64 {
        self.points[0].fid - 1
    }

    /// Position of the last sample (`fid - 1`).
    pub fn last(&self) -> i64 {
        self.points[self.points.len() - 1].fid - 1
    }
}

/// Frame (pixel) and time (depth) extents of one interpreted section image.
#[derive(Debug, Clone)]
pub struct ExtentRecord {
    pub nm: String,
    pub frame_left: f64,
    pub frame_top: f64,
    pub frame_right: f64,
    pub frame_bottom: f64,
    pub t_left: f64,
    pub t_top: f64,
    pub t_right: f64,
    pub t_bottom: f64,
}

impl ExtentRecord {
    /// Pixel-row to depth scale. A degenerate frame makes the whole depth
    /// mapping undefined, so this is a hard error rather than an infinity.
    pub fn y_scale(&self) -> Result<f64> {
        let d = self.frame_bottom - self.frame_top;
        if d == 0.0 {
            bail!("line {}: frame_bottom == frame_top, depth scale undefined", self.nm);
        }
        Ok((self.t_bottom - self.t_top) / d)
    }
}

#[derive(Debug, Clone)]
pub struct ExtentTable {
    pub records: Vec<ExtentRecord>,
}

impl ExtentTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading extent file {}", path.display()))?;
        let mut records = Vec::new();
        for (i, line) in text.lines().enumerate() {
            let f: Vec<&str> = line.split_whitespace().collect();
            if f.is_empty() {
                continue;
            }
            if f.len() < 9 {
                bail!(
                    "{}: line {}: expected 9 fields, got {}",
                    path.display(),
                    i + 1,
                    f.len()
                );
            }
            let parse = |s: &str| -> Result<f64> {
                s.parse::<f64>()
                    .with_context(|| format!("{}: line {}: bad number {s:?}", path.display(), i + 1))
            };
            records.push(ExtentRecord {
                nm: f[0].to_string(),
                frame_left: parse(f[1])?,
                frame_top: parse(f[2])?,
                frame_right: parse(f[3])?,
                frame_bottom: parse(f[4])?,
                t_left: parse(f[5])?,
                t_top: parse(f[6])?,
                t_right: parse(f[7])?,
                t_bottom: parse(f[8])?,
            });
        }
        if records.is_empty() {
            bail!("{}: no extent records", path.display());
        }
        Ok(Self { records })
    }

    pub fn line_ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.nm.clone()).collect()
    }

    pub fn get(&self, nm: &str) -> Option<&ExtentRecord> {
        self.records.iter().find(|r| r.nm == nm)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

/// Feature-class colors, normalized to [0, 1]. A missing class is not an
/// error here; callers substitute a default and keep going.
#[derive(Debug, Default)]
pub struct ColorTable {
    map: HashMap<String, Rgb>,
}

impl ColorTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading color table {}", path.display()))?;
        let mut map = HashMap::new();
        // First line is the column header.
        for line in text.lines().skip(1) {
            let parts: Vec<&str> = PRN_SPLIT_RE.split(line.trim_end()).collect();
            if parts.len() < 4 || parts[0].is_empty() {
                continue;
            }
            let chan = |s: &str| -> Result<f64> {
                s.trim()
                    .parse::<f64>()
                    .with_context(|| format!("{}: bad color channel {s:?}", path.display()))
            };
            map.insert(
                parts[0].trim().to_string(),
                Rgb {
                    r: chan(parts[1])? / 256.0,
                    g: chan(parts[2])? / 256.0,
                    b: chan(parts[3])? / 256.0,
                },
            );
        }
        Ok(Self { map })
    }

    pub fn get(&self, class: &str) -> Option<Rgb> {
        self.map.get(class).copied()
    }
}

/// Over/under stratigraphic-age lookup for the CSV export. Missing columns
/// and missing classes both resolve to empty strings.
#[derive(Debug, Default)]
pub struct SplitTable {
    map: HashMap<String, (String, String)>,
}

impl SplitTable {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading split table {}", path.display()))?;
        let mut map = HashMap::new();
        for line in text.lines().skip(1) {
            let parts: Vec<&str> = PRN_SPLIT_RE.split(line.trim_end()).collect();
            if parts.is_empty() || parts[0].is_empty() {
                continue;
            }
            let over = parts.get(1).map(|s| s.trim()).unwrap_or("").to_string();
            let under = parts.get(2).map(|s| s.trim()).unwrap_or("").to_string();
            map.insert(parts[0].trim().to_string(), (over, under));
        }
        Ok(Self { map })
    }

    pub fn get(&self, class: &str) -> Option<(&str, &str)> {
        self.map
            .get(class)
            .map(|(o, u)| (o.as_str(), u.as_str()))
    }
}
