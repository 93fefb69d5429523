//! Core library for the dammap survey toolkit.
//!
//! Walks a tree of dam survey photos laid out as
//! `<arroyo_num>_<arroyo_name>/<dam_name>_<yyyy-mm-dd>_<picnum>.<ext>`,
//! extracts EXIF GPS and timestamp metadata, and builds an in-memory index
//! that downstream writers (CSV, shapefile, KML) and reports consume.

pub mod dedup;
pub mod index;
pub mod matcher;
pub mod metadata;
pub mod record;
pub mod report;

pub use index::{index_tree, Bounds, CorpusSnapshot};
pub use matcher::{match_surveys, MatchReport, BIG_DISTANCE_DD};
pub use record::{DmsAxis, GeoTag, ImageRecord};
pub use report::{duplicate_report, DuplicateReport};

/// Token separator in arroyo directory names and image file stems.
pub const TOKEN_SEPARATOR: char = '_';
/// Separator inside the date token of an image file stem.
pub const DATE_SEPARATOR: char = '-';
/// Sentinel key in `unique_coords` for images without usable geodata.
pub const NO_GEO_KEY: &str = "no_geo";
/// Arroyo bucket for files whose directory name does not parse.
pub const UNKNOWN_ARROYO: &str = "unknown_arroyo";
/// Recognized image extensions, compared case-insensitively.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "tif", "tiff"];

/// Run-time knobs shared by the indexer, matcher, and writers.
///
/// Defaults cover the Anaya survey area; everything is overridable from the
/// command line.
#[derive(Debug, Clone, Copy)]
pub struct SurveyConfig {
    /// Bounding box used for `in_bounds` membership.
    pub bounds: Bounds,
    /// Distance (decimal degrees) under which two recorded coordinates are
    /// reported as near-coincident.
    pub buffer_distance: f64,
    /// Nearest-dam distance (decimal degrees) above which a match is suspect.
    pub big_distance: f64,
    /// Target thumbnail width in pixels.
    pub thumb_width: u32,
}

impl Default for SurveyConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds {
                min_x: -106.07259,
                min_y: 35.43479,
                max_x: -106.05353,
                max_y: 35.45045,
            },
            buffer_distance: 0.0002,
            big_distance: BIG_DISTANCE_DD,
            thumb_width: 500,
        }
    }
}
