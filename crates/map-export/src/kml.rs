//! KML and KMZ output for Google Earth.
//!
//! The document format follows the files the field crews already work
//! with: an optional satellite GroundOverlay, then one Placemark per
//! in-bounds geolocated image with a thumbnail in its description balloon
//! and a close-range LookAt.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use dam_survey::index::{Bounds, CorpusSnapshot};
use dam_survey::record::{GeoTag, ImageRecord};
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

pub struct KmlOptions<'a> {
    /// Folder name shown in the Google Earth places panel.
    pub folder_name: &'a str,
    /// Href of a satellite image to stretch over the bounding box.
    pub overlay_href: Option<&'a str>,
    /// LatLonBox for the overlay.
    pub bounds: Bounds,
    /// Width hint for the thumbnail in the description balloon.
    pub thumb_width: u32,
}

/// Write a standalone `.kml`. Returns the placemark count.
pub fn write_kml(path: &Path, snapshot: &CorpusSnapshot, opts: &KmlOptions) -> Result<usize> {
    crate::ready_parent(path)?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let count = render(&mut writer, snapshot, opts)?;
    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(count)
}

/// Write the same document as `doc.kml` inside a `.kmz` archive.
pub fn write_kmz(path: &Path, snapshot: &CorpusSnapshot, opts: &KmlOptions) -> Result<usize> {
    crate::ready_parent(path)?;
    let file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut zip = ZipWriter::new(file);
    zip.start_file("doc.kml", SimpleFileOptions::default())
        .context("failed to start doc.kml entry")?;
    let count = render(&mut zip, snapshot, opts)?;
    zip.finish()
        .with_context(|| format!("failed to finish {}", path.display()))?;
    Ok(count)
}

fn render<W: Write>(w: &mut W, snapshot: &CorpusSnapshot, opts: &KmlOptions) -> Result<usize> {
    writeln!(w, r#"<?xml version="1.0" encoding="utf-8" ?>"#)?;
    writeln!(w, r#"<kml xmlns="http://www.opengis.net/kml/2.2">"#)?;
    writeln!(w, r#"<Document id="root_doc">"#)?;
    writeln!(w, "<Folder><name>{}</name>", escape(opts.folder_name))?;
    if let Some(href) = opts.overlay_href {
        ground_overlay(w, href, &opts.bounds)?;
    }

    let mut count = 0;
    for record in snapshot.iter_records() {
        if !record.in_bounds {
            continue;
        }
        let Some(geo) = record.geo.as_ref() else {
            continue;
        };
        placemark(w, record, geo, opts.thumb_width)?;
        count += 1;
    }

    writeln!(w, "</Folder>")?;
    writeln!(w, "</Document></kml>")?;
    Ok(count)
}

fn ground_overlay<W: Write>(w: &mut W, href: &str, bounds: &Bounds) -> Result<()> {
    writeln!(w, "<GroundOverlay>")?;
    writeln!(w, "  <name>Satellite overlay</name>")?;
    writeln!(w, "  <Icon><href>{}</href></Icon>", escape(href))?;
    writeln!(w, "  <LatLonBox>")?;
    writeln!(w, "    <north>{}</north>", bounds.max_y)?;
    writeln!(w, "    <south>{}</south>", bounds.min_y)?;
    writeln!(w, "    <east>{}</east>", bounds.max_x)?;
    writeln!(w, "    <west>{}</west>", bounds.min_x)?;
    writeln!(w, "  </LatLonBox>")?;
    writeln!(w, "</GroundOverlay>")?;
    Ok(())
}

fn placemark<W: Write>(
    w: &mut W,
    record: &ImageRecord,
    geo: &GeoTag,
    thumb_width: u32,
) -> Result<()> {
    let date = record
        .img_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "0-0-0".to_string());
    let arroyo = record.arroyo_name.as_deref().unwrap_or("unknown arroyo");
    let img_src = record.thumb_rel.as_deref().unwrap_or(&record.rel_path);

    writeln!(w, "<Placemark>")?;
    writeln!(w, "  <name>{}</name>", escape(&record.basename))?;
    writeln!(
        w,
        r#"  <description>{} in {} on {}<img src="{}" width="{}" /></description>"#,
        escape(&record.basename),
        escape(arroyo),
        date,
        escape(img_src),
        thumb_width
    )?;
    writeln!(w, "  <LookAt>")?;
    writeln!(w, "    <longitude>{}</longitude>", geo.longitude)?;
    writeln!(w, "    <latitude>{}</latitude>", geo.latitude)?;
    writeln!(w, "    <altitude>2</altitude>")?;
    writeln!(w, "    <range>4</range>")?;
    writeln!(w, "    <tilt>45</tilt>")?;
    writeln!(w, "    <heading>0</heading>")?;
    writeln!(w, "    <altitudeMode>relativeToGround</altitudeMode>")?;
    writeln!(w, "  </LookAt>")?;
    writeln!(
        w,
        "  <Point><coordinates>{},{}</coordinates></Point>",
        geo.longitude, geo.latitude
    )?;
    writeln!(w, "</Placemark>")?;
    Ok(())
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dam_survey::{CorpusSnapshot, SurveyConfig};
    use std::fs;
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
            // The files do not exist on disk, so EXIF-derived fields must be
            // filled in by hand; mirror a camera whose capture date matches
            // the filename date.
            rec.img_date = rec.dam_date;
            snap.insert(rec);
        }
        snap
    }

    fn options(bounds: Bounds) -> KmlOptions<'static> {
        KmlOptions {
            folder_name: "Anaya dams",
            overlay_href: None,
            bounds,
            thumb_width: 500,
        }
    }

    #[test]
    fn only_in_bounds_records_become_placemarks() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dam_map.kml");
        let snap = snapshot_with(&[
            // Inside the default survey box.
            ("7_Anaya/anaya_2021-03-10_0001.JPG", Some((-106.0620556, 35.4359889))),
            // Far outside it.
            ("7_Anaya/anaya_2021-03-10_0002.JPG", Some((-105.0, 36.0))),
            ("7_Anaya/anaya_2021-03-10_0003.JPG", None),
        ]);

        let count = write_kml(&out, &snap, &options(snap.given_bounds)).unwrap();
        assert_eq!(count, 1);

        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("<name>anaya_2021-03-10_0001.JPG</name>"));
        assert!(text.contains("<coordinates>-106.0620556,35.4359889</coordinates>"));
        assert!(text.contains("anaya_2021-03-10_0001.JPG in Anaya on 2021-03-10"));
        assert!(text.contains("<altitudeMode>relativeToGround</altitudeMode>"));
        assert!(!text.contains("anaya_2021-03-10_0002.JPG in"));
    }

    #[test]
    fn overlay_block_uses_the_bounding_box() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dam_map.kml");
        let snap = snapshot_with(&[]);
        let mut opts = options(snap.given_bounds);
        opts.overlay_href = Some("satellite.png");

        write_kml(&out, &snap, &opts).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert!(text.contains("<href>satellite.png</href>"));
        assert!(text.contains(&format!("<north>{}</north>", snap.given_bounds.max_y)));
        assert!(text.contains(&format!("<west>{}</west>", snap.given_bounds.min_x)));
    }

    #[test]
    fn kmz_is_a_zip_archive() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("dam_map.kmz");
        let snap = snapshot_with(&[(
            "7_Anaya/anaya_2021-03-10_0001.JPG",
            Some((-106.0620556, 35.4359889)),
        )]);

        let count = write_kmz(&out, &snap, &options(snap.given_bounds)).unwrap();
        assert_eq!(count, 1);
        let bytes = fs::read(&out).unwrap();
        // Zip local-file-header magic.
        assert_eq!(&bytes[..4], b"PK\x03\x04");
    }
}
