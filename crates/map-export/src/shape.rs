//! ESRI shapefile output.
//!
//! One point feature per geolocated record, WGS84 coordinates, attribute
//! schema mirroring the CSV. Field names stay within the 10-character
//! dbase limit.

use std::path::Path;

use anyhow::{anyhow, Result};
use dam_survey::index::CorpusSnapshot;
use dam_survey::record::ImageRecord;
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Point, Writer};

fn field_name(name: &str) -> Result<FieldName> {
    FieldName::try_from(name).map_err(|e| anyhow!("invalid dbase field name {name}: {e:?}"))
}

fn attribute_table() -> Result<TableWriterBuilder> {
    Ok(TableWriterBuilder::new()
        .add_character_field(field_name("fullpath")?, 254)
        .add_character_field(field_name("thumb")?, 120)
        .add_character_field(field_name("basename")?, 80)
        .add_character_field(field_name("arroyo")?, 40)
        .add_numeric_field(field_name("arroyo_num")?, 10, 0)
        .add_character_field(field_name("dam")?, 40)
        .add_numeric_field(field_name("dam_num")?, 10, 0)
        .add_character_field(field_name("dam_date")?, 10)
        .add_character_field(field_name("img_date")?, 10)
        .add_numeric_field(field_name("longitude")?, 20, 7)
        .add_numeric_field(field_name("latitude")?, 20, 7)
        .add_character_field(field_name("geomwkt")?, 60)
        .add_character_field(field_name("xdirection")?, 1)
        .add_numeric_field(field_name("xdegrees")?, 20, 7)
        .add_numeric_field(field_name("xminutes")?, 20, 7)
        .add_numeric_field(field_name("xseconds")?, 20, 7)
        .add_character_field(field_name("ydirection")?, 1)
        .add_numeric_field(field_name("ydegrees")?, 20, 7)
        .add_numeric_field(field_name("yminutes")?, 20, 7)
        .add_numeric_field(field_name("yseconds")?, 20, 7)
        .add_numeric_field(field_name("in_bounds")?, 1, 0))
}

/// Write every geolocated record as a point feature. Returns the feature
/// count. Records without coordinates have no geometry and are left to the
/// CSV output.
pub fn write_shapefile(path: &Path, snapshot: &CorpusSnapshot) -> Result<usize> {
    crate::ready_parent(path)?;
    let mut writer = Writer::from_path(path, attribute_table()?)
        .map_err(|e| anyhow!("failed to create shapefile {}: {e}", path.display()))?;

    let mut count = 0;
    for record in snapshot.iter_records() {
        let Some(geo) = record.geo.as_ref() else {
            continue;
        };
        writer
            .write_shape_and_record(&Point::new(geo.longitude, geo.latitude), &attributes(record))
            .map_err(|e| anyhow!("failed to write feature for {}: {e}", record.rel_path))?;
        count += 1;
    }
    Ok(count)
}

fn put_char(attrs: &mut Record, name: &str, value: Option<String>) {
    attrs.insert(name.to_string(), FieldValue::Character(value));
}

fn put_num(attrs: &mut Record, name: &str, value: Option<f64>) {
    attrs.insert(name.to_string(), FieldValue::Numeric(value));
}

fn attributes(record: &ImageRecord) -> Record {
    let mut attrs = Record::default();
    put_char(&mut attrs, "fullpath", Some(record.full_path.display().to_string()));
    put_char(&mut attrs, "thumb", record.thumb_rel.clone());
    put_char(&mut attrs, "basename", Some(record.basename.clone()));
    put_char(&mut attrs, "arroyo", record.arroyo_name.clone());
    put_char(&mut attrs, "dam", record.dam_name.clone());
    put_char(&mut attrs, "dam_date", record.dam_date.map(|d| d.to_string()));
    put_char(&mut attrs, "img_date", record.img_date.map(|d| d.to_string()));
    put_char(&mut attrs, "geomwkt", record.wkt());
    put_num(&mut attrs, "arroyo_num", record.arroyo_num.map(f64::from));
    put_num(&mut attrs, "dam_num", record.pic_num.map(f64::from));
    put_num(&mut attrs, "in_bounds", Some(if record.in_bounds { 1.0 } else { 0.0 }));

    let geo = record.geo.as_ref();
    put_num(&mut attrs, "longitude", geo.map(|g| g.longitude));
    put_num(&mut attrs, "latitude", geo.map(|g| g.latitude));
    put_char(&mut attrs, "xdirection", geo.map(|g| g.x.hemisphere.to_string()));
    put_num(&mut attrs, "xdegrees", geo.map(|g| g.x.degrees));
    put_num(&mut attrs, "xminutes", geo.map(|g| g.x.minutes));
    put_num(&mut attrs, "xseconds", geo.map(|g| g.x.seconds));
    put_char(&mut attrs, "ydirection", geo.map(|g| g.y.hemisphere.to_string()));
    put_num(&mut attrs, "ydegrees", geo.map(|g| g.y.degrees));
    put_num(&mut attrs, "yminutes", geo.map(|g| g.y.minutes));
    put_num(&mut attrs, "yseconds", geo.map(|g| g.y.seconds));
    attrs
}

#[cfg(test)]
mod tests {
    use super::*;
    use dam_survey::record::GeoTag;
    use dam_survey::{CorpusSnapshot, SurveyConfig};
    use std::path::PathBuf;

    fn snapshot_with(records: &[(&str, Option<(f64, f64)>)]) -> CorpusSnapshot {
        let mut snap =
            CorpusSnapshot::new(PathBuf::from("/data"), SurveyConfig::default().bounds);
        for (rel, coords) in records {
            let mut rec = ImageRecord::from_file(
                &Path::new("/data").join(rel),
                Path::new("/data"),
            )
            .unwrap();
            rec.geo = coords.map(|(lon, lat)| GeoTag::from_decimal(lon, lat));
            snap.insert(rec);
        }
        snap
    }

    #[test]
    fn writes_one_feature_per_geolocated_record() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dam_map.shp");
        let snap = snapshot_with(&[
            ("7_Anaya/anaya_2021-03-10_0001.JPG", Some((-106.0620556, 35.4359889))),
            ("7_Anaya/anaya_2021-03-10_0002.JPG", None),
        ]);

        let features = write_shapefile(&out, &snap).unwrap();
        assert_eq!(features, 1);
        assert!(out.exists());
        assert!(out.with_extension("dbf").exists());
        assert!(out.with_extension("shx").exists());

        let read_back =
            shapefile::read_as::<_, Point, Record>(&out).unwrap();
        assert_eq!(read_back.len(), 1);
        let (point, attrs) = &read_back[0];
        assert!((point.x - -106.0620556).abs() < 1e-9);
        assert_eq!(
            attrs.get("dam_num"),
            Some(&FieldValue::Numeric(Some(1.0)))
        );
        assert_eq!(
            attrs.get("arroyo"),
            Some(&FieldValue::Character(Some("Anaya".to_string())))
        );
    }

    #[test]
    fn empty_snapshot_still_produces_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("empty.shp");
        let snap = snapshot_with(&[]);
        let features = write_shapefile(&out, &snap).unwrap();
        assert_eq!(features, 0);
        assert!(out.with_extension("dbf").exists());
    }
}
