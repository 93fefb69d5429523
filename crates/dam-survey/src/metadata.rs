//! EXIF tag extraction.
//!
//! Reads the handful of tags the survey pipeline consumes: GPS coordinates,
//! a capture date, and the camera make/model. Files without EXIF data are
//! common in the corpus (scans, edited copies), so absent tags are never
//! errors, only `None`.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDate;
use exif::{Exif, In, Reader, Tag, Value};
use tracing::warn;

use crate::record::{DmsAxis, GeoTag};

/// Capture-date tags in priority order. The first tag present wins, even if
/// its value then fails to parse.
const DATE_TAGS: [Tag; 3] = [Tag::GPSDateStamp, Tag::DateTime, Tag::DateTimeOriginal];

/// Extracted EXIF metadata for one image.
#[derive(Debug, Default)]
pub struct ImageTags {
    pub date: Option<NaiveDate>,
    pub camera: Option<String>,
    pub geo: Option<GeoTag>,
}

/// Read the tags for `path`. Unreadable or tag-free files yield an empty
/// `ImageTags` with a warning.
pub fn read_tags(path: &Path) -> ImageTags {
    let exif = match open_exif(path) {
        Ok(exif) => exif,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unable to read image metadata");
            return ImageTags::default();
        }
    };
    ImageTags {
        date: capture_date(&exif),
        camera: make_model(&exif),
        geo: coordinates(&exif, path),
    }
}

fn open_exif(path: &Path) -> anyhow::Result<Exif> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    Ok(Reader::new().read_from_container(&mut reader)?)
}

fn ascii_value(exif: &Exif, tag: Tag) -> Option<String> {
    let field = exif.get_field(tag, In::PRIMARY)?;
    if let Value::Ascii(ref lines) = field.value {
        lines
            .first()
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    } else {
        None
    }
}

fn capture_date(exif: &Exif) -> Option<NaiveDate> {
    let raw = DATE_TAGS.iter().find_map(|&tag| ascii_value(exif, tag))?;
    parse_exif_date(&raw)
}

/// Parse `yyyy:mm:dd`, dropping any trailing time after a space.
fn parse_exif_date(raw: &str) -> Option<NaiveDate> {
    let datestr = raw.split(' ').next().unwrap_or(raw);
    let parts: Vec<&str> = datestr.split(':').collect();
    if parts.len() != 3 {
        warn!(value = raw, "date tag does not split into three fields");
        return None;
    }
    let (Ok(y), Ok(m), Ok(d)) = (
        parts[0].parse::<i32>(),
        parts[1].parse::<u32>(),
        parts[2].parse::<u32>(),
    ) else {
        warn!(value = raw, "date tag cannot be parsed into integers");
        return None;
    };
    let date = NaiveDate::from_ymd_opt(y, m, d);
    if date.is_none() {
        warn!(value = raw, "date tag is not a valid calendar date");
    }
    date
}

fn make_model(exif: &Exif) -> Option<String> {
    let make = ascii_value(exif, Tag::Make)?;
    let model = ascii_value(exif, Tag::Model)?;
    Some(format!("{make}: {model}"))
}

fn gps_axis(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<DmsAxis> {
    let field = exif.get_field(value_tag, In::PRIMARY)?;
    let Value::Rational(ref parts) = field.value else {
        return None;
    };
    if parts.len() != 3 {
        return None;
    }
    let hemisphere = ascii_value(exif, ref_tag)?.chars().next()?;
    Some(DmsAxis {
        degrees: parts[0].to_f64(),
        minutes: parts[1].to_f64(),
        seconds: parts[2].to_f64(),
        hemisphere,
    })
}

/// Both-or-neither: an image with only one usable GPS axis is treated as
/// having no coordinates at all.
fn coordinates(exif: &Exif, path: &Path) -> Option<GeoTag> {
    let x = gps_axis(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef);
    let y = gps_axis(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef);
    match (x, y) {
        (Some(x), Some(y)) => Some(GeoTag::from_axes(x, y)),
        (None, None) => None,
        _ => {
            warn!(path = %path.display(), "incomplete GPS tags, dropping the coordinate pair");
            None
        }
    }
}
