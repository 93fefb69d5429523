//! Thumbnail generation.
//!
//! The KML description balloons reference reduced copies of the survey
//! photos; full-size field images are 4-8 MB and make Google Earth crawl.
//! Thumbnails land under `<out>/thumb/<relpath>`, mirroring the corpus
//! layout.

use std::path::Path;

use anyhow::{Context, Result};
use dam_survey::index::CorpusSnapshot;
use image::imageops::FilterType;
use image::GenericImageView;
use tracing::{info, warn};

pub const THUMB_DIR: &str = "thumb";

/// Resize one image to `width` pixels, preserving aspect ratio.
///
/// Returns false when the destination already exists and `overwrite` is
/// not set.
pub fn reduce_image(src: &Path, dest: &Path, width: u32, overwrite: bool) -> Result<bool> {
    if dest.exists() && !overwrite {
        return Ok(false);
    }
    crate::ready_parent(dest)?;
    let img = image::open(src).with_context(|| format!("failed to open {}", src.display()))?;
    let (src_w, src_h) = img.dimensions();
    let ratio = f64::from(width) / f64::from(src_w);
    let height = ((f64::from(src_h) * ratio).round() as u32).max(1);
    let resized = img.resize(width, height, FilterType::Lanczos3);
    resized
        .save(dest)
        .with_context(|| format!("failed to write {}", dest.display()))?;
    Ok(true)
}

/// Generate a thumbnail for every indexed image and record its relative
/// path on the record. Per-image failures are logged and skipped; the walk
/// continues. Returns the number of thumbnails written.
pub fn write_thumbnails(
    snapshot: &mut CorpusSnapshot,
    out_path: &Path,
    width: u32,
    overwrite: bool,
) -> usize {
    let rels: Vec<String> = snapshot
        .arroyo_order
        .iter()
        .filter_map(|name| snapshot.arroyos.get(name))
        .flatten()
        .cloned()
        .collect();

    let mut written = 0;
    for rel in rels {
        let Some(record) = snapshot.images.get_mut(&rel) else {
            continue;
        };
        let dest = out_path.join(THUMB_DIR).join(&rel);
        match reduce_image(&record.full_path, &dest, width, overwrite) {
            Ok(fresh) => {
                record.thumb_rel = Some(format!("{THUMB_DIR}/{rel}"));
                if fresh {
                    written += 1;
                }
            }
            Err(e) => {
                warn!(path = %record.full_path.display(), error = %e, "thumbnail failed")
            }
        }
    }
    info!(
        written,
        width,
        "thumbnails under {}",
        out_path.join(THUMB_DIR).display()
    );
    written
}
