//! Corpus indexing.
//!
//! Walks an image tree once and builds a [`CorpusSnapshot`]: per-arroyo file
//! lists in first-appearance order, a flat record map, coordinate grouping,
//! and camera usage counters. One damaged file never aborts a walk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use serde::Serialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::record::ImageRecord;
use crate::{IMAGE_EXTENSIONS, NO_GEO_KEY, UNKNOWN_ARROYO};

/// Closed-interval bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn from_point(lon: f64, lat: f64) -> Self {
        Self {
            min_x: lon,
            min_y: lat,
            max_x: lon,
            max_y: lat,
        }
    }

    /// Membership test. Both edges are inclusive.
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        lon >= self.min_x && lon <= self.max_x && lat >= self.min_y && lat <= self.max_y
    }

    /// Grow the box to cover the given point.
    pub fn expand(&mut self, lon: f64, lat: f64) {
        self.min_x = self.min_x.min(lon);
        self.max_x = self.max_x.max(lon);
        self.min_y = self.min_y.min(lat);
        self.max_y = self.max_y.max(lat);
    }

    /// Parse `"minx,miny,maxx,maxy"`, tolerating surrounding parentheses and
    /// whitespace.
    pub fn parse(s: &str) -> Result<Self> {
        let values = s
            .split(',')
            .map(|part| {
                let part = part.trim().trim_matches(|c| c == '(' || c == ')').trim();
                part.parse::<f64>()
                    .map_err(|_| anyhow::anyhow!("'{part}' is not a number"))
            })
            .collect::<Result<Vec<f64>>>()?;
        if values.len() != 4 {
            bail!("expected 4 comma-separated values, got {}", values.len());
        }
        let bounds = Self {
            min_x: values[0],
            min_y: values[1],
            max_x: values[2],
            max_y: values[3],
        };
        if bounds.min_x > bounds.max_x || bounds.min_y > bounds.max_y {
            bail!("bounding box minimum exceeds maximum");
        }
        Ok(bounds)
    }
}

/// Everything learned from one walk of an image tree.
#[derive(Debug, Serialize)]
pub struct CorpusSnapshot {
    pub base_path: PathBuf,
    /// Arroyo names in order of first appearance during the walk.
    pub arroyo_order: Vec<String>,
    /// Arroyo name -> relative file names, in walk order.
    pub arroyos: HashMap<String, Vec<String>>,
    /// Relative file name -> record.
    pub images: HashMap<String, ImageRecord>,
    pub img_count: usize,
    pub geo_count: usize,
    /// WKT string -> {arroyo -> [relative file names]}. Images without
    /// coordinates are filed under [`NO_GEO_KEY`].
    pub unique_coords: HashMap<String, HashMap<String, Vec<String>>>,
    /// Camera `Make: Model` -> image count.
    pub camera_counts: HashMap<String, usize>,
    /// The box `in_bounds` was evaluated against.
    pub given_bounds: Bounds,
    /// Extent of every geolocated image seen so far. Diagnostic only; never
    /// feeds back into `in_bounds`.
    pub computed_extent: Option<Bounds>,
}

impl CorpusSnapshot {
    pub fn new(base_path: PathBuf, bounds: Bounds) -> Self {
        Self {
            base_path,
            arroyo_order: Vec::new(),
            arroyos: HashMap::new(),
            images: HashMap::new(),
            img_count: 0,
            geo_count: 0,
            unique_coords: HashMap::new(),
            camera_counts: HashMap::new(),
            given_bounds: bounds,
            computed_extent: None,
        }
    }

    /// Records in deterministic corpus order: arroyos by first appearance,
    /// files in walk order within each arroyo.
    pub fn iter_records(&self) -> impl Iterator<Item = &ImageRecord> + '_ {
        self.arroyo_order
            .iter()
            .filter_map(|name| self.arroyos.get(name))
            .flatten()
            .filter_map(|rel| self.images.get(rel))
    }

    /// Fold a fully extracted record into the index.
    pub fn insert(&mut self, mut record: ImageRecord) {
        self.img_count += 1;
        let arroyo = record
            .arroyo_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_ARROYO.to_string());
        if !self.arroyos.contains_key(&arroyo) {
            self.arroyo_order.push(arroyo.clone());
        }
        self.arroyos
            .entry(arroyo.clone())
            .or_default()
            .push(record.rel_path.clone());
        *self.camera_counts.entry(record.camera.clone()).or_insert(0) += 1;

        let coord_key = match record.geo.as_ref() {
            Some(geo) => {
                self.geo_count += 1;
                record.in_bounds = self.given_bounds.contains(geo.longitude, geo.latitude);
                match self.computed_extent.as_mut() {
                    Some(extent) => extent.expand(geo.longitude, geo.latitude),
                    None => {
                        self.computed_extent = Some(Bounds::from_point(geo.longitude, geo.latitude))
                    }
                }
                geo.wkt()
            }
            None => NO_GEO_KEY.to_string(),
        };
        self.unique_coords
            .entry(coord_key)
            .or_default()
            .entry(arroyo)
            .or_default()
            .push(record.rel_path.clone());

        self.images.insert(record.rel_path.clone(), record);
    }
}

/// Walk `root` and index every recognized image file.
///
/// Hidden files and non-image extensions are skipped. A file that fails
/// extraction is logged and skipped without aborting the walk.
pub fn index_tree(root: &Path, bounds: Bounds) -> Result<CorpusSnapshot> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let mut snapshot = CorpusSnapshot::new(root.to_path_buf(), bounds);
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.starts_with('.') || !has_image_extension(&name) {
            continue;
        }
        match ImageRecord::from_file(entry.path(), root) {
            Ok(record) => snapshot.insert(record),
            Err(e) => warn!(path = %entry.path().display(), error = %e, "skipping file"),
        }
    }
    info!(
        images = snapshot.img_count,
        geolocated = snapshot.geo_count,
        arroyos = snapshot.arroyo_order.len(),
        "indexed {}",
        root.display()
    );
    Ok(snapshot)
}

fn has_image_extension(name: &str) -> bool {
    name.rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
