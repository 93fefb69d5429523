//! Image record model and name parsing.
//!
//! A survey image carries two independent sources of metadata: identifiers
//! encoded in its path (`<arroyo_num>_<arroyo_name>/<dam>_<y-m-d>_<picnum>`)
//! and EXIF tags embedded in the file. Both are best-effort; malformed
//! tokens are logged and the affected fields stay `None`.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::warn;

use crate::metadata;
use crate::{DATE_SEPARATOR, TOKEN_SEPARATOR};

/// One axis of a sexagesimal GPS coordinate, kept verbatim for traceability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DmsAxis {
    pub degrees: f64,
    pub minutes: f64,
    pub seconds: f64,
    /// Hemisphere reference letter: N, S, E, or W.
    pub hemisphere: char,
}

impl DmsAxis {
    /// Signed decimal degrees; W and S hemispheres are negative.
    pub fn to_decimal(&self) -> f64 {
        let dd = self.degrees + self.minutes / 60.0 + self.seconds / 3600.0;
        if matches!(self.hemisphere, 'W' | 'S') {
            -dd
        } else {
            dd
        }
    }

    /// Decompose decimal degrees into degree/minute/second components with
    /// the appropriate hemisphere letter for the axis.
    pub fn from_decimal(dd: f64, positive: char, negative: char) -> Self {
        let hemisphere = if dd < 0.0 { negative } else { positive };
        let abs = dd.abs();
        let degrees = abs.trunc();
        let minutes = ((abs - degrees) * 60.0).trunc();
        let seconds = (abs - degrees) * 3600.0 - minutes * 60.0;
        Self {
            degrees,
            minutes,
            seconds,
            hemisphere,
        }
    }
}

impl fmt::Display for DmsAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}d {}' {}\" {}",
            self.degrees, self.minutes, self.seconds, self.hemisphere
        )
    }
}

/// Both GPS axes of an image. Present only when the EXIF data yields a
/// complete longitude/latitude pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoTag {
    pub longitude: f64,
    pub latitude: f64,
    /// Longitude axis as recorded in the EXIF tags.
    pub x: DmsAxis,
    /// Latitude axis as recorded in the EXIF tags.
    pub y: DmsAxis,
}

impl GeoTag {
    pub fn from_axes(x: DmsAxis, y: DmsAxis) -> Self {
        Self {
            longitude: x.to_decimal(),
            latitude: y.to_decimal(),
            x,
            y,
        }
    }

    /// Build a tag directly from decimal degrees, synthesizing the
    /// sexagesimal components.
    pub fn from_decimal(longitude: f64, latitude: f64) -> Self {
        Self {
            longitude,
            latitude,
            x: DmsAxis::from_decimal(longitude, 'E', 'W'),
            y: DmsAxis::from_decimal(latitude, 'N', 'S'),
        }
    }

    /// Well-known-text point for this coordinate.
    ///
    /// The two spaces between the numbers are a long-standing quirk of this
    /// dataset; duplicate detection and downstream consumers key on exact
    /// string equality, so the format must not be normalized.
    pub fn wkt(&self) -> String {
        format!("Point ({:.7}  {:.7})", self.longitude, self.latitude)
    }
}

/// One indexed survey photo.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRecord {
    pub full_path: PathBuf,
    /// Path relative to the walked base, with `/` separators.
    pub rel_path: String,
    pub basename: String,
    pub arroyo_num: Option<u32>,
    pub arroyo_name: Option<String>,
    pub dam_name: Option<String>,
    /// Survey date encoded in the file name. Independent of `img_date`.
    pub dam_date: Option<NaiveDate>,
    pub pic_num: Option<u32>,
    /// Capture date from the EXIF tags. Independent of `dam_date`.
    pub img_date: Option<NaiveDate>,
    pub geo: Option<GeoTag>,
    /// Camera `Make: Model`, or `"unknown"`.
    pub camera: String,
    /// Relative path of the generated thumbnail, once one exists.
    pub thumb_rel: Option<String>,
    /// Closed-interval membership in the configured bounding box.
    pub in_bounds: bool,
    /// Nearest ground-truth dam, set only by the cross-survey matcher.
    pub matched_dam: Option<String>,
    /// Distance to `matched_dam` in decimal degrees.
    pub match_distance: Option<f64>,
}

impl ImageRecord {
    /// Build a record for `full_path`, which must live under `base_path`.
    ///
    /// Malformed path tokens and unreadable EXIF data are logged warnings;
    /// the record is still produced with the affected fields absent.
    pub fn from_file(full_path: &Path, base_path: &Path) -> Result<Self> {
        let rel = full_path.strip_prefix(base_path).with_context(|| {
            format!(
                "{} is not under base path {}",
                full_path.display(),
                base_path.display()
            )
        })?;
        let rel_path = rel.to_string_lossy().replace('\\', "/");
        let basename = rel
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| rel_path.clone());

        let mut record = Self {
            full_path: full_path.to_path_buf(),
            rel_path,
            basename,
            arroyo_num: None,
            arroyo_name: None,
            dam_name: None,
            dam_date: None,
            pic_num: None,
            img_date: None,
            geo: None,
            camera: "unknown".to_string(),
            thumb_rel: None,
            in_bounds: false,
            matched_dam: None,
            match_distance: None,
        };
        record.parse_rel_path();

        let tags = metadata::read_tags(full_path);
        record.img_date = tags.date;
        if let Some(camera) = tags.camera {
            record.camera = camera;
        }
        record.geo = tags.geo;
        Ok(record)
    }

    /// WKT point string, when the record has coordinates.
    pub fn wkt(&self) -> Option<String> {
        self.geo.as_ref().map(GeoTag::wkt)
    }

    pub fn has_geo(&self) -> bool {
        self.geo.is_some()
    }

    fn parse_rel_path(&mut self) {
        let parts: Vec<&str> = self.rel_path.split('/').collect();
        if parts.len() != 2 {
            warn!(
                rel = %self.rel_path,
                "relative path does not split into arroyo directory and file name"
            );
            return;
        }
        let (dirname, fname) = (parts[0], parts[1]);

        let dir_tokens: Vec<&str> = dirname.split(TOKEN_SEPARATOR).collect();
        if dir_tokens.len() == 2 {
            match dir_tokens[0].parse::<u32>() {
                Ok(num) => {
                    self.arroyo_num = Some(num);
                    self.arroyo_name = Some(dir_tokens[1].to_string());
                }
                Err(_) => warn!(dir = dirname, "arroyo directory does not start with a number"),
            }
        } else {
            warn!(dir = dirname, "arroyo directory does not split into number and name");
        }

        let stem = match fname.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => fname,
        };
        let name_tokens: Vec<&str> = stem.split(TOKEN_SEPARATOR).collect();
        if name_tokens.len() != 3 {
            warn!(
                file = fname,
                "file stem does not split into dam name, date, and picture number"
            );
            return;
        }
        self.dam_name = Some(name_tokens[0].to_string());
        self.dam_date = parse_name_date(name_tokens[1]);
        match name_tokens[2].parse::<u32>() {
            Ok(num) => self.pic_num = Some(num),
            Err(_) => warn!(file = fname, "picture number is not an integer"),
        }
    }
}

fn parse_name_date(token: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = token.split(DATE_SEPARATOR).collect();
    if parts.len() != 3 {
        warn!(date = token, "date token does not split into three fields");
        return None;
    }
    let (Ok(y), Ok(m), Ok(d)) = (
        parts[0].parse::<i32>(),
        parts[1].parse::<u32>(),
        parts[2].parse::<u32>(),
    ) else {
        warn!(date = token, "date token cannot be parsed into integers");
        return None;
    };
    let date = NaiveDate::from_ymd_opt(y, m, d);
    if date.is_none() {
        warn!(date = token, "date token is not a valid calendar date");
    }
    date
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dms_to_decimal_negates_west_and_south() {
        let x = DmsAxis {
            degrees: 106.0,
            minutes: 3.0,
            seconds: 43.4,
            hemisphere: 'W',
        };
        let y = DmsAxis {
            degrees: 35.0,
            minutes: 26.0,
            seconds: 9.56,
            hemisphere: 'N',
        };
        assert!((x.to_decimal() - -106.0620556).abs() < 1e-6);
        assert!((y.to_decimal() - 35.4359889).abs() < 1e-6);
    }

    #[test]
    fn dms_round_trip_within_tolerance() {
        let dd = -106.0620556;
        let axis = DmsAxis::from_decimal(dd, 'E', 'W');
        assert_eq!(axis.hemisphere, 'W');
        assert!((axis.to_decimal() - dd).abs() < 1e-9);
    }

    #[test]
    fn wkt_keeps_two_spaces_and_seven_decimals() {
        let geo = GeoTag::from_decimal(-106.06205555555556, 35.43598888888889);
        assert_eq!(geo.wkt(), "Point (-106.0620556  35.4359889)");
    }

    #[test]
    fn parses_well_formed_relative_path() {
        let rec = ImageRecord::from_file(
            Path::new("/data/pics/42_Bend/bend_2021-03-10_0131.JPG"),
            Path::new("/data/pics"),
        )
        .unwrap();
        assert_eq!(rec.rel_path, "42_Bend/bend_2021-03-10_0131.JPG");
        assert_eq!(rec.basename, "bend_2021-03-10_0131.JPG");
        assert_eq!(rec.arroyo_num, Some(42));
        assert_eq!(rec.arroyo_name.as_deref(), Some("Bend"));
        assert_eq!(rec.dam_name.as_deref(), Some("bend"));
        assert_eq!(rec.dam_date, NaiveDate::from_ymd_opt(2021, 3, 10));
        assert_eq!(rec.pic_num, Some(131));
        // The file does not exist, so EXIF-derived fields stay absent.
        assert_eq!(rec.img_date, None);
        assert!(rec.geo.is_none());
        assert_eq!(rec.camera, "unknown");
    }

    #[test]
    fn malformed_tokens_leave_fields_absent() {
        let rec = ImageRecord::from_file(
            Path::new("/data/pics/notanumber_Bend/bend_badmonth_0131.JPG"),
            Path::new("/data/pics"),
        )
        .unwrap();
        assert_eq!(rec.arroyo_num, None);
        assert_eq!(rec.arroyo_name, None);
        // The stem still has three tokens, so the dam name parses.
        assert_eq!(rec.dam_name.as_deref(), Some("bend"));
        assert_eq!(rec.dam_date, None);
    }

    #[test]
    fn too_few_path_components_is_nonfatal() {
        let rec = ImageRecord::from_file(
            Path::new("/data/pics/loose_file.JPG"),
            Path::new("/data/pics"),
        )
        .unwrap();
        assert_eq!(rec.rel_path, "loose_file.JPG");
        assert_eq!(rec.arroyo_name, None);
        assert_eq!(rec.dam_name, None);
    }

    #[test]
    fn base_path_must_be_prefix() {
        let err = ImageRecord::from_file(
            Path::new("/elsewhere/42_Bend/bend_2021-03-10_0131.JPG"),
            Path::new("/data/pics"),
        );
        assert!(err.is_err());
    }

    #[test]
    fn wkt_absent_without_coordinates() {
        let rec = ImageRecord::from_file(
            Path::new("/data/pics/42_Bend/bend_2021-03-10_0131.JPG"),
            Path::new("/data/pics"),
        )
        .unwrap();
        assert_eq!(rec.wkt(), None);
    }
}
