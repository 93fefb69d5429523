//! `dammap`: map and organize dam survey photo archives.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use dam_survey::{
    dedup, duplicate_report, index_tree, match_surveys, Bounds, SurveyConfig, BIG_DISTANCE_DD,
};
use map_export::{csv_out, kml, shape, thumbs};

#[derive(Parser)]
#[command(name = "dammap", version, about = "Map and organize dam survey photo archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index an image tree, write thumbnails, and emit CSV/shapefile/KML
    Map {
        /// Root of the arroyo/image tree
        #[arg(short, long)]
        path: PathBuf,
        /// Output directory for thumbnails and generated files
        #[arg(short, long)]
        out: PathBuf,
        /// Base name for the generated files
        #[arg(long, default_value = "dam_map")]
        name: String,
        /// Bounding box as "minx,miny,maxx,maxy" in decimal degrees
        #[arg(long, value_parser = Bounds::parse)]
        bbox: Option<Bounds>,
        /// Thumbnail width in pixels
        #[arg(long, default_value_t = 500)]
        thumb_width: u32,
        /// Overwrite existing thumbnails
        #[arg(long)]
        overwrite: bool,
        /// Skip the shapefile output
        #[arg(long)]
        no_shp: bool,
        /// Skip the KML output
        #[arg(long)]
        no_kml: bool,
        /// Also write a KMZ archive
        #[arg(long)]
        kmz: bool,
        /// Satellite image href for a KML ground overlay
        #[arg(long)]
        overlay: Option<String>,
    },
    /// Assign early-survey images to the nearest ground-truth dam
    MatchSurveys {
        /// Tree with one trusted, well-named image per dam
        #[arg(long)]
        ground_truth: PathBuf,
        /// Tree of earlier images to assign
        #[arg(long)]
        early: PathBuf,
        /// Suspect-match distance threshold in decimal degrees
        #[arg(long, default_value_t = BIG_DISTANCE_DD)]
        big_distance: f64,
        /// Write the full match report as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Report groups of images sharing an identical recorded coordinate
    Duplicates {
        /// Root of the arroyo/image tree
        #[arg(short, long)]
        path: PathBuf,
        /// Bounding box as "minx,miny,maxx,maxy" in decimal degrees
        #[arg(long, value_parser = Bounds::parse)]
        bbox: Option<Bounds>,
        /// Report distinct coordinates closer than this (decimal degrees)
        #[arg(long, default_value_t = 0.0002)]
        buffer: f64,
    },
    /// Find byte-identical files by content hash
    Dedup {
        /// Tree to scan
        #[arg(short, long)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dammap=info,dam_survey=info,map_export=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match Cli::parse().command {
        Commands::Map {
            path,
            out,
            name,
            bbox,
            thumb_width,
            overwrite,
            no_shp,
            no_kml,
            kmz,
            overlay,
        } => run_map(
            &path,
            &out,
            &name,
            bbox,
            thumb_width,
            overwrite,
            no_shp,
            no_kml,
            kmz,
            overlay.as_deref(),
        ),
        Commands::MatchSurveys {
            ground_truth,
            early,
            big_distance,
            output,
        } => run_match(&ground_truth, &early, big_distance, output.as_deref()),
        Commands::Duplicates { path, bbox, buffer } => run_duplicates(&path, bbox, buffer),
        Commands::Dedup { path } => run_dedup(&path),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_map(
    path: &std::path::Path,
    out: &std::path::Path,
    name: &str,
    bbox: Option<Bounds>,
    thumb_width: u32,
    overwrite: bool,
    no_shp: bool,
    no_kml: bool,
    kmz: bool,
    overlay: Option<&str>,
) -> Result<()> {
    let config = SurveyConfig::default();
    let bounds = bbox.unwrap_or(config.bounds);

    let mut snapshot = index_tree(path, bounds)?;
    thumbs::write_thumbnails(&mut snapshot, out, thumb_width, overwrite);

    let base = out.join(name);
    let rows = csv_out::write_csv(&base.with_extension("csv"), &snapshot)?;
    info!(rows, "wrote {}", base.with_extension("csv").display());

    if !no_shp {
        let features = shape::write_shapefile(&base.with_extension("shp"), &snapshot)?;
        info!(features, "wrote {}", base.with_extension("shp").display());
    }

    let opts = kml::KmlOptions {
        folder_name: name,
        overlay_href: overlay,
        bounds,
        thumb_width,
    };
    if !no_kml {
        let placemarks = kml::write_kml(&base.with_extension("kml"), &snapshot, &opts)?;
        info!(placemarks, "wrote {}", base.with_extension("kml").display());
    }
    if kmz {
        let placemarks = kml::write_kmz(&base.with_extension("kmz"), &snapshot, &opts)?;
        info!(placemarks, "wrote {}", base.with_extension("kmz").display());
    }

    if let Some(extent) = snapshot.computed_extent {
        info!(
            "given bounds ({}, {}, {}, {}); computed extent ({}, {}, {}, {})",
            bounds.min_x,
            bounds.min_y,
            bounds.max_x,
            bounds.max_y,
            extent.min_x,
            extent.min_y,
            extent.max_x,
            extent.max_y
        );
    }
    for (camera, count) in &snapshot.camera_counts {
        info!(count, "camera {camera}");
    }
    Ok(())
}

fn run_match(
    ground_truth: &std::path::Path,
    early: &std::path::Path,
    big_distance: f64,
    output: Option<&std::path::Path>,
) -> Result<()> {
    let bounds = SurveyConfig::default().bounds;
    let ground = index_tree(ground_truth, bounds)?;
    let mut candidate = index_tree(early, bounds)?;

    let report = match_surveys(&ground, &mut candidate, big_distance);
    for arroyo in &report.arroyos {
        println!("{}:", arroyo.arroyo);
        for dam in &arroyo.dams {
            println!("  {} ({}, {})", dam.dam_name, dam.longitude, dam.latitude);
            for image in &dam.images {
                let mark = if image.suspect { " SUSPECT" } else { "" };
                println!("    {} at {:.7}{}", image.rel_path, image.distance, mark);
            }
        }
    }
    println!(
        "{} assigned, {} suspect, {} arroyos skipped, {} unmatched",
        report.assigned,
        report.suspect,
        report.skipped_arroyos.len(),
        report.unmatched.len()
    );

    if let Some(path) = output {
        let json = serde_json::to_string_pretty(&report)?;
        fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
        info!("wrote {}", path.display());
    }
    Ok(())
}

fn run_duplicates(path: &std::path::Path, bbox: Option<Bounds>, buffer: f64) -> Result<()> {
    let bounds = bbox.unwrap_or(SurveyConfig::default().bounds);
    let snapshot = index_tree(path, bounds)?;
    let report = duplicate_report(&snapshot);

    for group in &report.groups {
        println!("{} ({} images)", group.wkt, group.count);
        for member in &group.members {
            for rel in &member.rel_paths {
                println!("  {rel}");
            }
        }
    }
    if !report.no_geo.is_empty() {
        println!("without coordinates:");
        for member in &report.no_geo {
            for rel in &member.rel_paths {
                println!("  {rel}");
            }
        }
    }
    let near = dam_survey::report::near_coincident(&snapshot, buffer);
    for pair in &near {
        println!(
            "near ({:.7} dd): {} and {}",
            pair.distance, pair.first, pair.second
        );
    }
    println!(
        "{} duplicate coordinate groups, {} near pairs, {} images without geodata",
        report.groups.len(),
        near.len(),
        report.no_geo.iter().map(|m| m.rel_paths.len()).sum::<usize>()
    );
    Ok(())
}

fn run_dedup(path: &std::path::Path) -> Result<()> {
    let sets = dedup::find_content_duplicates(path)?;
    for set in &sets {
        println!("{}:", set.digest);
        for file in &set.paths {
            println!("  {}", file.display());
        }
    }
    println!("{} duplicate sets", sets.len());
    Ok(())
}
