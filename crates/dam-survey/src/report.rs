//! Duplicate-coordinate and near-coincidence reporting.
//!
//! Pure reductions over a built [`CorpusSnapshot`]; nothing here touches
//! the filesystem or mutates the index.

use serde::Serialize;

use crate::index::CorpusSnapshot;
use crate::NO_GEO_KEY;

/// Images from one arroyo sharing a coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct GroupMember {
    pub arroyo: String,
    pub rel_paths: Vec<String>,
}

/// All images recorded at one exact WKT coordinate.
#[derive(Debug, Clone, Serialize)]
pub struct CoordinateGroup {
    pub wkt: String,
    pub count: usize,
    pub members: Vec<GroupMember>,
}

#[derive(Debug, Default, Serialize)]
pub struct DuplicateReport {
    /// Groups with more than one image, largest first.
    pub groups: Vec<CoordinateGroup>,
    /// Images without geodata, grouped by arroyo.
    pub no_geo: Vec<GroupMember>,
}

/// Two images whose recorded coordinates are closer than the buffer.
#[derive(Debug, Clone, Serialize)]
pub struct NearPair {
    pub first: String,
    pub second: String,
    pub distance: f64,
}

/// Group images by exact recorded coordinate.
///
/// GPS noise makes exact agreement between independent fixes effectively
/// impossible, so a shared WKT string almost always means copies of one
/// photo or a camera with a stale fix.
pub fn duplicate_report(snapshot: &CorpusSnapshot) -> DuplicateReport {
    let mut report = DuplicateReport::default();
    for (wkt, by_arroyo) in &snapshot.unique_coords {
        let mut members: Vec<GroupMember> = by_arroyo
            .iter()
            .map(|(arroyo, rel_paths)| GroupMember {
                arroyo: arroyo.clone(),
                rel_paths: rel_paths.clone(),
            })
            .collect();
        members.sort_by(|a, b| a.arroyo.cmp(&b.arroyo));

        if wkt == NO_GEO_KEY {
            report.no_geo = members;
            continue;
        }
        let count = members.iter().map(|m| m.rel_paths.len()).sum();
        if count > 1 {
            report.groups.push(CoordinateGroup {
                wkt: wkt.clone(),
                count,
                members,
            });
        }
    }
    report
        .groups
        .sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.wkt.cmp(&b.wkt)));
    report
}

/// Find pairs of geolocated images closer together than `buffer_distance`
/// but not at the identical coordinate. Quadratic over the geolocated set;
/// the corpus is a few thousand images.
pub fn near_coincident(snapshot: &CorpusSnapshot, buffer_distance: f64) -> Vec<NearPair> {
    let located: Vec<(&str, f64, f64)> = snapshot
        .iter_records()
        .filter_map(|rec| {
            rec.geo
                .as_ref()
                .map(|geo| (rec.rel_path.as_str(), geo.longitude, geo.latitude))
        })
        .collect();

    let mut pairs = Vec::new();
    for (i, &(rel_a, lon_a, lat_a)) in located.iter().enumerate() {
        for &(rel_b, lon_b, lat_b) in &located[i + 1..] {
            let dist = (lon_a - lon_b).hypot(lat_a - lat_b);
            if dist > 0.0 && dist < buffer_distance {
                pairs.push(NearPair {
                    first: rel_a.to_string(),
                    second: rel_b.to_string(),
                    distance: dist,
                });
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{GeoTag, ImageRecord};
    use std::path::{Path, PathBuf};

    fn snapshot_with(records: &[(&str, Option<(f64, f64)>)]) -> CorpusSnapshot {
        let bounds = crate::SurveyConfig::default().bounds;
        let mut snap = CorpusSnapshot::new(PathBuf::from("/data"), bounds);
        for (rel, coords) in records {
            let mut rec =
                ImageRecord::from_file(&Path::new("/data").join(rel), Path::new("/data")).unwrap();
            rec.geo = coords.map(|(lon, lat)| GeoTag::from_decimal(lon, lat));
            snap.insert(rec);
        }
        snap
    }

    #[test]
    fn shared_wkt_forms_one_group_of_two() {
        let snap = snapshot_with(&[
            ("7_Anaya/a_2021-03-10_0001.JPG", Some((-106.0620556, 35.4359889))),
            ("7_Anaya/a_2021-03-10_0002.JPG", Some((-106.0620556, 35.4359889))),
            ("7_Anaya/a_2021-03-10_0003.JPG", Some((-106.0700000, 35.4400000))),
        ]);
        let report = duplicate_report(&snap);
        assert_eq!(report.groups.len(), 1);
        let group = &report.groups[0];
        assert_eq!(group.wkt, "Point (-106.0620556  35.4359889)");
        assert_eq!(group.count, 2);
        assert_eq!(group.members[0].rel_paths.len(), 2);
        assert!(report.no_geo.is_empty());
    }

    #[test]
    fn groups_sorted_largest_first() {
        let snap = snapshot_with(&[
            ("7_Anaya/a_2021-03-10_0001.JPG", Some((-106.06, 35.44))),
            ("7_Anaya/a_2021-03-10_0002.JPG", Some((-106.06, 35.44))),
            ("7_Anaya/b_2021-03-10_0003.JPG", Some((-106.07, 35.45))),
            ("7_Anaya/b_2021-03-10_0004.JPG", Some((-106.07, 35.45))),
            ("7_Anaya/b_2021-03-10_0005.JPG", Some((-106.07, 35.45))),
        ]);
        let report = duplicate_report(&snap);
        assert_eq!(report.groups.len(), 2);
        assert_eq!(report.groups[0].count, 3);
        assert_eq!(report.groups[1].count, 2);
    }

    #[test]
    fn no_geo_images_are_listed_separately() {
        let snap = snapshot_with(&[
            ("7_Anaya/a_2021-03-10_0001.JPG", None),
            ("9_Lodge/b_2021-03-10_0001.JPG", None),
        ]);
        let report = duplicate_report(&snap);
        assert!(report.groups.is_empty());
        assert_eq!(report.no_geo.len(), 2);
        assert_eq!(report.no_geo[0].arroyo, "Anaya");
        assert_eq!(report.no_geo[1].arroyo, "Lodge");
    }

    #[test]
    fn near_coincident_excludes_identical_points() {
        let snap = snapshot_with(&[
            ("7_Anaya/a_2021-03-10_0001.JPG", Some((-106.06000, 35.44000))),
            ("7_Anaya/a_2021-03-10_0002.JPG", Some((-106.06000, 35.44000))),
            ("7_Anaya/a_2021-03-10_0003.JPG", Some((-106.06005, 35.44000))),
            ("7_Anaya/a_2021-03-10_0004.JPG", Some((-106.07000, 35.45000))),
        ]);
        let pairs = near_coincident(&snap, 0.0002);
        // Identical pair excluded, distant point excluded; 0001/0002 each
        // pair with 0003 at 0.00005 dd.
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|p| p.distance < 0.0002));
    }
}
