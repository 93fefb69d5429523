//! Tab-delimited CSV output.
//!
//! One row per indexed image, geolocated or not, in corpus order. The
//! column set and order are fixed; downstream spreadsheets and the GIS
//! import both key on them.

use std::path::Path;

use anyhow::{Context, Result};
use dam_survey::index::CorpusSnapshot;
use dam_survey::record::ImageRecord;

pub const CSV_COLUMNS: [&str; 22] = [
    "fullpath",
    "thumb",
    "basename",
    "arroyo",
    "arroyo_num",
    "dam",
    "dam_num",
    "dam_date",
    "img_date",
    "longitude",
    "latitude",
    "geomwkt",
    "xdirection",
    "xdegrees",
    "xminutes",
    "xseconds",
    "ydirection",
    "ydegrees",
    "yminutes",
    "yseconds",
    "in_bounds",
    "no_geo",
];

/// Write every record to `path`. Returns the number of rows written.
pub fn write_csv(path: &Path, snapshot: &CorpusSnapshot) -> Result<usize> {
    crate::ready_parent(path)?;
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(CSV_COLUMNS)?;

    let mut count = 0;
    for record in snapshot.iter_records() {
        writer.write_record(csv_row(record))?;
        count += 1;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(count)
}

fn csv_row(record: &ImageRecord) -> Vec<String> {
    let mut row = vec![
        record.full_path.display().to_string(),
        record.thumb_rel.clone().unwrap_or_default(),
        record.basename.clone(),
        record.arroyo_name.clone().unwrap_or_default(),
        opt_field(record.arroyo_num),
        record.dam_name.clone().unwrap_or_default(),
        opt_field(record.pic_num),
        opt_field(record.dam_date),
        opt_field(record.img_date),
    ];
    match record.geo.as_ref() {
        Some(geo) => {
            row.push(geo.longitude.to_string());
            row.push(geo.latitude.to_string());
            row.push(geo.wkt());
            row.push(geo.x.hemisphere.to_string());
            row.push(geo.x.degrees.to_string());
            row.push(geo.x.minutes.to_string());
            row.push(geo.x.seconds.to_string());
            row.push(geo.y.hemisphere.to_string());
            row.push(geo.y.degrees.to_string());
            row.push(geo.y.minutes.to_string());
            row.push(geo.y.seconds.to_string());
        }
        None => row.extend(std::iter::repeat(String::new()).take(11)),
    }
    row.push(flag(record.in_bounds));
    row.push(flag(!record.has_geo()));
    row
}

fn opt_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn flag(value: bool) -> String {
    if value { "1" } else { "0" }.to_string()
}
