//! Output writers for the dammap survey toolkit.
//!
//! Consumes a [`dam_survey::CorpusSnapshot`] and produces the delivery
//! artifacts: tab-delimited CSV, ESRI point shapefile, KML/KMZ for Google
//! Earth, and the thumbnails the KML references. A failure in one writer
//! never corrupts the in-memory snapshot.

pub mod csv_out;
pub mod kml;
pub mod shape;
pub mod thumbs;

pub use csv_out::write_csv;
pub use kml::{write_kml, write_kmz, KmlOptions};
pub use shape::write_shapefile;
pub use thumbs::{reduce_image, write_thumbnails};

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Create the parent directories of an output file if needed.
pub(crate) fn ready_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}
