//! Flat CSV export (`.egs`): one row per vertex of the merged document,
//! joined with the over/under stratigraphic ages of its feature class.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;

use crate::cursor::{starts_numeric, LineCursor};
use crate::summary::RunSummary;
use crate::tables::SplitTable;

use super::meta_field;

pub const HEADER: &str = "Vertex,SegmentID,X,Y,ELEVATION,PixelX,PixelY,AusAEM_DEM,DEPTH,\
Type,OverAge,UnderAge,BoundConf,ContactTyp,BasisOfInt,OvrStrtUnt,OvrStratNo,OvrConf,\
UndStrtUnt,UndStratNo,UndConf,WithinStrt,WithinStNo,WithinConf,HydStrtType,HydStrConf,\
BOMNAFUnt,BOMNAFNo,InterpRef,Comment,Annotation,NewObs,Operator,Date,SURVEY_LINE\n";

/// Emit `SORT/{nm}.egs` from `SORT/{nm}.gmts`. Values are echoed as they
/// appear in the merged document, not re-formatted.
pub fn write_egs(
    work_dir: &Path,
    nm: &str,
    ages: &SplitTable,
    summary: &mut RunSummary,
) -> Result<()> {
    let srt_dir = work_dir.join("SORT");
    let input = srt_dir.join(format!("{nm}.gmts"));
    let text = fs::read_to_string(&input)
        .with_context(|| format!("reading merged document {}", input.display()))?;

    let mut out = String::from(HEADER);
    let mut cursor = LineCursor::new(&text);

    // Per-block context, refreshed at each metadata line.
    let mut class = String::new();
    let mut over = String::new();
    let mut under = String::new();
    let mut tail = String::new();

    while let Some(line) = cursor.advance() {
        if line.contains("@D") {
            let met: Vec<&str> = line.split('|').collect();
            class = meta_field(&met, 1).to_string();
            if met.len() < 24 {
                warn!("{nm}: metadata record for {class:?} is short ({} fields)", met.len());
                summary.short_metadata += 1;
            }
            (over, under) = match ages.get(&class) {
                Some((o, u)) => (o.to_string(), u.to_string()),
                None => {
                    warn!("{nm}: no age record for class {class:?}");
                    summary.lookup_misses += 1;
                    (String::new(), String::new())
                }
            };
            tail.clear();
            for i in 2..24 {
                tail.push(',');
                tail.push_str(meta_field(&met, i));
            }
            continue;
        }
        if !starts_numeric(line) {
            continue;
        }
        let f: Vec<&str> = line.split_whitespace().collect();
        if f.len() < 11 {
            continue;
        }
        let _ = writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{class},{over},{under}{tail},{nm}",
            f[9], f[8], f[2], f[3], f[4], f[0], f[1], f[5], f[6]
        );
    }

    let output = srt_dir.join(format!("{nm}.egs"));
    fs::write(&output, out)
        .with_context(|| format!("writing {}", output.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const GMTS: &str = "\
# HDR
>
# @D0|Base_Cenozoic|a|b|
 0.5 -1.0 15.0 150.0 10.0 10.0 0.0 1 0 1 1
 0.6 2.0 16.0 160.0 -20.0 11.0 31.0 2 0 2 1
";

    fn ages() -> SplitTable {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(
            b"TYPE  OVERAGE  UNDERAGE\n\
              Base_Cenozoic  Cenozoic  Paleozoic\n",
        )
        .unwrap();
        SplitTable::load(f.path()).unwrap()
    }

    fn emit(gmts: &str) -> (String, RunSummary) {
        let dir = tempfile::tempdir().unwrap();
        let srt = dir.path().join("SORT");
        fs::create_dir_all(&srt).unwrap();
        fs::write(srt.join("100.gmts"), gmts).unwrap();
        let mut summary = RunSummary::default();
        write_egs(dir.path(), "100", &ages(), &mut summary).unwrap();
        (fs::read_to_string(srt.join("100.egs")).unwrap(), summary)
    }

    #[test]
    fn rows_follow_the_header_layout() {
        let (out, _) = emit(GMTS);
        let mut lines = out.lines();
        let header = lines.next().unwrap();
        assert_eq!(header.split(',').count(), 35);
        let row = lines.next().unwrap();
        assert_eq!(row.split(',').count(), 35);
        assert!(row.starts_with("1,0,15.0,150.0,10.0,0.5,-1.0,10.0,0.0,Base_Cenozoic,Cenozoic,Paleozoic,a,b,"));
        assert!(row.ends_with(",100"));
        assert_eq!(lines.count(), 1);
    }

    #[test]
    fn non_numeric_lines_never_become_rows() {
        let gmts = "\
# one long comment line with more than eleven whitespace separated tokens in it here
>
# @D0|Base_Cenozoic|a|b|
 0.5 -1.0 15.0 150.0 10.0 10.0 0.0 1 0 1 1
";
        let (out, _) = emit(gmts);
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().nth(1).unwrap().starts_with("1,0,"));
    }

    #[test]
    fn unknown_class_gets_empty_ages() {
        let gmts = "\
>
# @D0|Mystery|a|b|
 0.5 -1.0 15.0 150.0 10.0 10.0 0.0 1 0 1 1
";
        let (out, summary) = emit(gmts);
        assert!(out.lines().nth(1).unwrap().contains(",Mystery,,,a,b,"));
        assert_eq!(summary.lookup_misses, 1);
    }
}
