//! Forbidden construction zones and the solid exclusion decision.
//!
//! Zones are plain-text WKT polygon files, one polygon per file, authored in
//! WGS 84 and reprojected once into the working reference system per reload.
//! The membership test is a two-stage lookup: an R-tree over zone bounding
//! boxes narrows candidates, then the exact even-odd test decides.

use crate::entities::BuildingSolid;
use crate::solids::SolidAccumulator;
use crate::ReloadError;
use geomkit::lambert72::lonlat_to_lambert72;
use geomkit::wkt::{parse_polygon, WktError};
use geomkit::{Polygon2, Vertex2};
use rstar::{RTree, RTreeObject, AABB};
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Outcome of one solid's exclusion test. `IncludedAfterError` means the
/// geometric computation needed for the test failed upstream and the solid
/// was retained fail-open; it is deliberately distinguishable from a genuine
/// `Included` so logs and tests can tell the two apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExclusionDecision {
    Excluded,
    Included,
    IncludedAfterError,
}

/// Loads every `.wkt` polygon under `dir`, reprojecting WGS 84
/// longitude/latitude vertices into Lambert 72.
///
/// Non-`.wkt` files and well-formed WKT of other geometry types are skipped
/// with a log line; unreadable or syntactically broken files abort the
/// reload.
pub fn load_forbidden_dir(dir: &Path) -> Result<Vec<Polygon2>, ReloadError> {
    let mut polygons = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true).into_iter() {
        let entry = entry.map_err(|err| ReloadError::PackageIo {
            path: dir.to_path_buf(),
            source: err.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();

        let is_wkt = path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.eq_ignore_ascii_case("wkt"))
            .unwrap_or(false);
        if !is_wkt {
            info!(path = %path.display(), "skipping non-wkt file in forbidden area directory");
            continue;
        }

        let text = std::fs::read_to_string(&path).map_err(|source| ReloadError::PackageIo {
            path: path.clone(),
            source,
        })?;

        match parse_polygon(text.trim()) {
            Ok(polygon) => polygons.push(reproject(&polygon)),
            Err(WktError::UnsupportedGeometry { found }) => {
                warn!(path = %path.display(), geometry = %found, "skipping non-polygon forbidden area");
            }
            Err(source) => return Err(ReloadError::ForbiddenZone { path, source }),
        }
    }

    info!(count = polygons.len(), "loaded forbidden areas");
    Ok(polygons)
}

fn reproject(polygon: &Polygon2) -> Polygon2 {
    let ring = |ring: &[Vertex2]| -> Vec<Vertex2> {
        ring.iter()
            .map(|&[lon, lat]| lonlat_to_lambert72(lon, lat))
            .collect()
    };
    Polygon2 {
        exterior: ring(&polygon.exterior),
        interiors: polygon.interiors.iter().map(|r| ring(r)).collect(),
    }
}

struct ZoneEnvelope {
    index: usize,
    env: AABB<Vertex2>,
}

impl RTreeObject for ZoneEnvelope {
    type Envelope = AABB<Vertex2>;

    #[inline]
    fn envelope(&self) -> Self::Envelope {
        self.env
    }
}

/// The per-reload exclusion zone set with its candidate index.
pub struct ForbiddenZones {
    zones: Vec<Polygon2>,
    tree: RTree<ZoneEnvelope>,
}

/// Per-decision tallies plus the cascade-delete list for the shadow tables.
#[derive(Debug, Default, PartialEq)]
pub struct ExclusionReport {
    pub excluded: Vec<i64>,
    pub included: u64,
    pub included_after_error: u64,
}

impl ForbiddenZones {
    pub fn new(zones: Vec<Polygon2>) -> Self {
        let boxes = zones
            .iter()
            .enumerate()
            .filter_map(|(index, zone)| {
                let (min_x, min_y, max_x, max_y) = zone.bbox()?;
                Some(ZoneEnvelope {
                    index,
                    env: AABB::from_corners([min_x, min_y], [max_x, max_y]),
                })
            })
            .collect();
        Self {
            zones,
            tree: RTree::bulk_load(boxes),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Decides one solid. `ground_failed` marks solids whose representative
    /// point derivation failed upstream (see `SolidAccumulator`).
    pub fn decide(&self, solid: &BuildingSolid, ground_failed: bool) -> ExclusionDecision {
        let Some(point) = solid.point else {
            return if ground_failed {
                ExclusionDecision::IncludedAfterError
            } else {
                // No ground surface at all: nothing to test.
                ExclusionDecision::Included
            };
        };

        let ground: Vertex2 = [point[0], point[1]];
        for candidate in self
            .tree
            .locate_in_envelope_intersecting(&AABB::from_point(ground))
        {
            if self.zones[candidate.index].contains(ground) {
                return ExclusionDecision::Excluded;
            }
        }
        ExclusionDecision::Included
    }

    /// Runs the decision over a whole reconstruction pass.
    pub fn assess(&self, acc: &SolidAccumulator) -> ExclusionReport {
        let mut report = ExclusionReport::default();
        for solid in acc.solids.values() {
            let ground_failed = acc.degenerate_grounds.contains(&solid.building_solid_id);
            match self.decide(solid, ground_failed) {
                ExclusionDecision::Excluded => report.excluded.push(solid.building_solid_id),
                ExclusionDecision::Included => report.included += 1,
                ExclusionDecision::IncludedAfterError => {
                    warn!(
                        building_solid_id = solid.building_solid_id,
                        "exclusion test skipped after geometry failure, solid retained"
                    );
                    report.included_after_error += 1;
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(id: i64, point: Option<[f64; 3]>) -> BuildingSolid {
        BuildingSolid {
            building_solid_id: id,
            point,
        }
    }

    fn unit_zone() -> Polygon2 {
        Polygon2::from_exterior(vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
    }

    #[test]
    fn point_inside_zone_is_excluded() {
        let zones = ForbiddenZones::new(vec![unit_zone()]);
        let decision = zones.decide(&solid(1, Some([0.5, 0.5, 12.0])), false);
        assert_eq!(decision, ExclusionDecision::Excluded);
    }

    #[test]
    fn point_outside_every_zone_is_included() {
        let zones = ForbiddenZones::new(vec![unit_zone()]);
        let decision = zones.decide(&solid(1, Some([5.0, 5.0, 0.0])), false);
        assert_eq!(decision, ExclusionDecision::Included);
    }

    #[test]
    fn ground_failure_is_fail_open_and_distinguishable() {
        let zones = ForbiddenZones::new(vec![unit_zone()]);
        let decision = zones.decide(&solid(1, None), true);
        assert_eq!(decision, ExclusionDecision::IncludedAfterError);
    }

    #[test]
    fn solid_without_point_is_plainly_included() {
        let zones = ForbiddenZones::new(vec![unit_zone()]);
        let decision = zones.decide(&solid(1, None), false);
        assert_eq!(decision, ExclusionDecision::Included);
    }

    #[test]
    fn assess_partitions_a_pass() {
        let mut acc = SolidAccumulator::default();
        acc.solids.insert(1, solid(1, Some([0.5, 0.5, 0.0])));
        acc.solids.insert(2, solid(2, Some([9.0, 9.0, 0.0])));
        acc.solids.insert(3, solid(3, None));
        acc.degenerate_grounds.insert(3);

        let report = ForbiddenZones::new(vec![unit_zone()]).assess(&acc);
        assert_eq!(report.excluded, vec![1]);
        assert_eq!(report.included, 1);
        assert_eq!(report.included_after_error, 1);
    }
}
