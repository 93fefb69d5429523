//! Cross-survey nearest-dam matching.
//!
//! An older survey recorded the same dams without the current naming scheme.
//! Given a ground-truth snapshot (one image per dam, trusted coordinates)
//! and a candidate snapshot, every candidate image is assigned to the
//! nearest ground-truth dam in its arroyo. Distances are planar Euclidean
//! in decimal degrees; the study area spans a few kilometres, so the
//! flat-earth error is far below the GPS noise floor.

use serde::Serialize;
use tracing::{info, warn};

use crate::index::CorpusSnapshot;

/// Default suspect-match threshold in decimal degrees, about 11.1 m of
/// latitude.
pub const BIG_DISTANCE_DD: f64 = 0.0001;

/// One candidate image assigned to a dam.
#[derive(Debug, Clone, Serialize)]
pub struct DamAssignment {
    pub rel_path: String,
    pub distance: f64,
    /// Distance exceeded the suspect threshold. The assignment stands; the
    /// flag only marks it for review.
    pub suspect: bool,
}

/// One ground-truth dam and the candidate images assigned to it.
#[derive(Debug, Serialize)]
pub struct DamMatches {
    pub dam_name: String,
    pub longitude: f64,
    pub latitude: f64,
    pub images: Vec<DamAssignment>,
}

#[derive(Debug, Serialize)]
pub struct ArroyoMatches {
    pub arroyo: String,
    pub dams: Vec<DamMatches>,
}

/// Full result of a matching run.
#[derive(Debug, Default, Serialize)]
pub struct MatchReport {
    pub arroyos: Vec<ArroyoMatches>,
    /// Candidate arroyos with no usable ground-truth counterpart.
    pub skipped_arroyos: Vec<String>,
    /// Candidate images without coordinates; they cannot be matched.
    pub unmatched: Vec<String>,
    pub assigned: usize,
    pub suspect: usize,
}

/// Assign every geolocated candidate image to its nearest ground-truth dam.
///
/// Ground truth is never mutated; candidate records gain `matched_dam` and
/// `match_distance`. Ties go to the first dam encountered in ground-truth
/// walk order.
pub fn match_surveys(
    ground_truth: &CorpusSnapshot,
    candidate: &mut CorpusSnapshot,
    big_distance: f64,
) -> MatchReport {
    let mut report = MatchReport::default();

    let arroyo_order = candidate.arroyo_order.clone();
    for arroyo in arroyo_order {
        let Some(gt_files) = ground_truth.arroyos.get(&arroyo) else {
            warn!(%arroyo, "arroyo missing from ground truth, skipping");
            report.skipped_arroyos.push(arroyo);
            continue;
        };

        let mut dams = dam_table(ground_truth, gt_files);
        if dams.is_empty() {
            warn!(%arroyo, "no geolocated ground-truth dams, skipping");
            report.skipped_arroyos.push(arroyo);
            continue;
        }

        let files = candidate.arroyos.get(&arroyo).cloned().unwrap_or_default();
        for rel in files {
            let Some(record) = candidate.images.get_mut(&rel) else {
                continue;
            };
            let Some(geo) = record.geo.as_ref() else {
                warn!(%rel, "candidate image has no coordinates, cannot match");
                report.unmatched.push(rel.clone());
                continue;
            };
            let (lon, lat) = (geo.longitude, geo.latitude);

            let mut best = 0;
            let mut best_dist = f64::INFINITY;
            for (i, dam) in dams.iter().enumerate() {
                let dist = (lon - dam.longitude).hypot(lat - dam.latitude);
                // Strict comparison keeps the first dam on exact ties.
                if dist < best_dist {
                    best = i;
                    best_dist = dist;
                }
            }

            let suspect = best_dist > big_distance;
            if suspect {
                warn!(
                    %rel,
                    dam = %dams[best].dam_name,
                    distance = best_dist,
                    "nearest dam is farther than the suspect threshold"
                );
                report.suspect += 1;
            }
            record.matched_dam = Some(dams[best].dam_name.clone());
            record.match_distance = Some(best_dist);
            dams[best].images.push(DamAssignment {
                rel_path: rel,
                distance: best_dist,
                suspect,
            });
            report.assigned += 1;
        }
        report.arroyos.push(ArroyoMatches { arroyo, dams });
    }

    info!(
        assigned = report.assigned,
        suspect = report.suspect,
        skipped = report.skipped_arroyos.len(),
        "cross-survey matching complete"
    );
    report
}

/// Dam name -> canonical coordinate, in ground-truth walk order. A dam name
/// seen twice keeps its first coordinate.
fn dam_table(ground_truth: &CorpusSnapshot, gt_files: &[String]) -> Vec<DamMatches> {
    let mut dams: Vec<DamMatches> = Vec::new();
    for rel in gt_files {
        let Some(record) = ground_truth.images.get(rel) else {
            continue;
        };
        let Some(geo) = record.geo.as_ref() else {
            warn!(%rel, "ground-truth image has no coordinates, dam not usable");
            continue;
        };
        let dam_name = record
            .dam_name
            .clone()
            .unwrap_or_else(|| record.basename.clone());
        if dams.iter().any(|d| d.dam_name == dam_name) {
            warn!(%dam_name, "duplicate ground-truth dam, keeping the first coordinate");
            continue;
        }
        dams.push(DamMatches {
            dam_name,
            longitude: geo.longitude,
            latitude: geo.latitude,
            images: Vec::new(),
        });
    }
    dams
}
