mod catalog;
mod cursor;
mod document;
mod exports;
mod interp;
mod ogr;
mod recolor;
mod sections;
mod sort;
mod summary;
mod tables;
mod zedfix;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};

use catalog::Catalog;
use summary::RunSummary;
use tables::{ColorTable, ExtentRecord, ExtentTable, PathTable, SplitTable};

#[derive(Parser)]
#[command(name = "aemflow", about = "AEM depth-interpretation geometry conversion")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Depth-correct and merge each flight line's interpreted document
    Convert {
        /// Directory with per-line flight path files ({nm}.path.txt)
        #[arg(short = 'i', long)]
        path_dir: PathBuf,
        /// Work directory holding interp/ and receiving SORT/, ZF_SHP/
        #[arg(short = 'o', long)]
        work_dir: PathBuf,
        /// Extent file (default: WORK_DIR/interp/active_extent.txt)
        #[arg(long)]
        extent: Option<PathBuf>,
        /// Import interpreted shapefiles from this directory first
        #[arg(long)]
        shp_dir: Option<PathBuf>,
    },
    /// Emit GOCAD and CSV exports from the merged documents
    Export {
        #[arg(short = 'o', long)]
        work_dir: PathBuf,
        #[arg(long)]
        extent: Option<PathBuf>,
        /// Feature-class color table (.prn)
        #[arg(long)]
        colors: PathBuf,
        /// Feature-class over/under age table (.prn)
        #[arg(long)]
        split: PathBuf,
        /// Line-grouped GOCAD export (default: all formats)
        #[arg(long)]
        mdc: bool,
        /// Class-grouped GOCAD export
        #[arg(long)]
        mdch: bool,
        /// Flat CSV export
        #[arg(long)]
        egs: bool,
    },
    /// Build the per-line section groups (.s1/.s2)
    Sections {
        #[arg(short = 'i', long)]
        path_dir: PathBuf,
        #[arg(short = 'o', long)]
        work_dir: PathBuf,
        #[arg(long)]
        extent: Option<PathBuf>,
    },
    /// Re-color the section groups into a viewer format
    Recolor {
        #[arg(short = 'o', long)]
        work_dir: PathBuf,
        #[arg(long)]
        extent: Option<PathBuf>,
        #[arg(long)]
        colors: PathBuf,
        #[arg(long, value_enum, default_value_t = Variant::Gp)]
        variant: Variant,
        /// Also write the viewer XML descriptor per line
        #[arg(long)]
        xml: bool,
    },
    /// Full pipeline: convert, export, sections, recolor
    Run {
        #[arg(short = 'i', long)]
        path_dir: PathBuf,
        #[arg(short = 'o', long)]
        work_dir: PathBuf,
        #[arg(long)]
        extent: Option<PathBuf>,
        #[arg(long)]
        colors: PathBuf,
        #[arg(long)]
        split: PathBuf,
        #[arg(long)]
        shp_dir: Option<PathBuf>,
    },
}

impl Commands {
    fn work_dir(&self) -> &Path {
        match self {
            Commands::Convert { work_dir, .. }
            | Commands::Export { work_dir, .. }
            | Commands::Sections { work_dir, .. }
            | Commands::Recolor { work_dir, .. }
            | Commands::Run { work_dir, .. } => work_dir,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Variant {
    Gp,
    Pl17,
    Hrz,
    Sctn,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let work_dir = cli.command.work_dir().to_path_buf();
    let mut summary = RunSummary::default();

    let result = match cli.command {
        Commands::Convert {
            path_dir,
            work_dir,
            extent,
            shp_dir,
        } => cmd_convert(&path_dir, &work_dir, extent, shp_dir, &mut summary),
        Commands::Export {
            work_dir,
            extent,
            colors,
            split,
            mdc,
            mdch,
            egs,
        } => cmd_export(&work_dir, extent, &colors, &split, (mdc, mdch, egs), &mut summary),
        Commands::Sections {
            path_dir,
            work_dir,
            extent,
        } => cmd_sections(&path_dir, &work_dir, extent, &mut summary),
        Commands::Recolor {
            work_dir,
            extent,
            colors,
            variant,
            xml,
        } => cmd_recolor(&work_dir, extent, &colors, variant, xml, &mut summary),
        Commands::Run {
            path_dir,
            work_dir,
            extent,
            colors,
            split,
            shp_dir,
        } => {
            cmd_convert(&path_dir, &work_dir, extent.clone(), shp_dir, &mut summary)
                .and_then(|_| {
                    cmd_export(
                        &work_dir,
                        extent.clone(),
                        &colors,
                        &split,
                        (false, false, false),
                        &mut summary,
                    )
                })
                .and_then(|_| cmd_sections(&path_dir, &work_dir, extent.clone(), &mut summary))
                .and_then(|_| {
                    cmd_recolor(&work_dir, extent, &colors, Variant::Gp, true, &mut summary)
                })
        }
    };

    summary.print();
    match summary.write_json(&work_dir) {
        Ok(path) => println!("Summary written to {}", path.display()),
        Err(e) => error!("could not write summary: {e:#}"),
    }

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn extent_file(work_dir: &Path, extent: Option<PathBuf>) -> PathBuf {
    extent.unwrap_or_else(|| work_dir.join("interp").join("active_extent.txt"))
}

fn progress(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

/// Record a per-line outcome; an error skips the line, never the batch.
fn tally(nm: &str, result: Result<()>, summary: &mut RunSummary) {
    match result {
        Ok(()) => summary.lines_ok += 1,
        Err(e) => {
            error!("line {nm}: {e:#}");
            summary.lines_failed += 1;
        }
    }
}

fn cmd_convert(
    path_dir: &Path,
    work_dir: &Path,
    extent: Option<PathBuf>,
    shp_dir: Option<PathBuf>,
    summary: &mut RunSummary,
) -> Result<()> {
    fs::create_dir_all(work_dir.join("SORT"))?;
    if let Some(shp_dir) = shp_dir {
        let imported = ogr::import_shapefiles(&shp_dir, work_dir, summary)?;
        println!("Imported {} interpreted shapefiles.", imported.len());
    }

    let extents = ExtentTable::load(&extent_file(work_dir, extent))?;
    let mut catalog = Catalog::open(&work_dir.join("SORT"))?;
    let zf_dir = work_dir.join("ZF_SHP");

    println!("Converting {} flight lines...", extents.records.len());
    let pb = progress(extents.records.len());
    for record in &extents.records {
        let result = convert_line(path_dir, work_dir, record, &zf_dir, &mut catalog, summary);
        tally(&record.nm, result, summary);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

fn convert_line(
    path_dir: &Path,
    work_dir: &Path,
    record: &ExtentRecord,
    zf_dir: &Path,
    catalog: &mut Catalog,
    summary: &mut RunSummary,
) -> Result<()> {
    let path = PathTable::load(&path_dir.join(format!("{}.path.txt", record.nm)))?;
    zedfix::correct_line(work_dir, &record.nm, &path, record, catalog, summary)?;
    sort::merge_line(work_dir, &record.nm)?;
    sort::materialize_shapefile(work_dir, zf_dir, &record.nm, summary)?;
    Ok(())
}

fn cmd_export(
    work_dir: &Path,
    extent: Option<PathBuf>,
    colors: &Path,
    split: &Path,
    (mdc, mdch, egs): (bool, bool, bool),
    summary: &mut RunSummary,
) -> Result<()> {
    let extents = ExtentTable::load(&extent_file(work_dir, extent))?;
    let colors = ColorTable::load(colors)?;
    let ages = SplitTable::load(split)?;
    let all = !(mdc || mdch || egs);

    let line_ids = extents.line_ids();
    println!("Exporting {} flight lines...", line_ids.len());
    let pb = progress(line_ids.len());
    for nm in &line_ids {
        if !work_dir.join("SORT").join(format!("{nm}.gmts")).is_file() {
            info!("line {nm}: no merged document, skipped");
            pb.inc(1);
            continue;
        }
        let result = (|| -> Result<()> {
            if all || mdc {
                exports::gocad::write_gocad(
                    work_dir,
                    nm,
                    &colors,
                    exports::gocad::Feature::LineId,
                    summary,
                )?;
            }
            if all || mdch {
                exports::gocad::write_gocad(
                    work_dir,
                    nm,
                    &colors,
                    exports::gocad::Feature::Class,
                    summary,
                )?;
            }
            if all || egs {
                exports::egs::write_egs(work_dir, nm, &ages, summary)?;
            }
            Ok(())
        })();
        tally(nm, result, summary);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

fn cmd_sections(
    path_dir: &Path,
    work_dir: &Path,
    extent: Option<PathBuf>,
    summary: &mut RunSummary,
) -> Result<()> {
    let extents = ExtentTable::load(&extent_file(work_dir, extent))?;
    sections::split_classes(work_dir, summary)?;
    let kept = sections::pixel_to_depth(work_dir, &extents)?;

    println!("Interpolating {} section groups...", kept.len());
    let pb = progress(kept.len());
    for nm in &kept {
        let result = PathTable::load(&path_dir.join(format!("{nm}.path.txt")))
            .and_then(|path| sections::interpolate_group(work_dir, nm, &path));
        tally(nm, result, summary);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

fn cmd_recolor(
    work_dir: &Path,
    extent: Option<PathBuf>,
    colors: &Path,
    variant: Variant,
    xml: bool,
    summary: &mut RunSummary,
) -> Result<()> {
    let extents = ExtentTable::load(&extent_file(work_dir, extent))?;
    let colors = ColorTable::load(colors)?;

    let line_ids = extents.line_ids();
    println!("Re-coloring {} section groups...", line_ids.len());
    let pb = progress(line_ids.len());
    for nm in &line_ids {
        if !work_dir.join("SORT").join(format!("{nm}.s2")).is_file() {
            info!("line {nm}: no section group, skipped");
            pb.inc(1);
            continue;
        }
        let result = match variant {
            Variant::Gp => {
                recolor::recolor_group(work_dir, nm, &colors, recolor::Style::Gp, summary)
            }
            Variant::Pl17 => {
                recolor::recolor_group(work_dir, nm, &colors, recolor::Style::Pl17, summary)
            }
            Variant::Hrz => recolor::recolor_with_metadata(
                work_dir,
                nm,
                &colors,
                recolor::MetaStyle::Horizon,
                summary,
            ),
            Variant::Sctn => recolor::recolor_with_metadata(
                work_dir,
                nm,
                &colors,
                recolor::MetaStyle::Section,
                summary,
            ),
        }
        .and_then(|_| if xml { recolor::write_xml(work_dir, nm) } else { Ok(()) });
        tally(nm, result, summary);
        pb.inc(1);
    }
    pb.finish_and_clear();
    Ok(())
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
