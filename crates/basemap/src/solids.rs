//! Building-solid reconstruction.
//!
//! The 3D source delivers flat face collections; solids exist only as parent
//! references on faces. Streaming the faces once rebuilds the solid set: a
//! solid is created (without geometry) the first time a face references it,
//! and every ground-surface face stamps its vertex centroid onto the parent
//! solid as the representative point. Solids are therefore never created
//! without at least one referencing face.

use crate::entities::{BuildingFace, BuildingFaceKind, BuildingSolid};
use crate::ids::{parse_id, UriBase};
use crate::source::{to_multipolygon_3d, SourceFaceRecord};
use crate::ReloadError;
use geomkit::{GeometryError, MultiPolygon3, Vertex3};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Accumulated solid state of one reconstruction pass.
#[derive(Debug, Default)]
pub struct SolidAccumulator {
    pub solids: BTreeMap<i64, BuildingSolid>,
    /// Solids whose ground-surface centroid could not be computed. Their
    /// exclusion test is skipped later, distinguishably (fail-open).
    pub degenerate_grounds: BTreeSet<i64>,
}

/// Wraps a face stream, resolving parent solid ids and accumulating the
/// solid map while the consumer pulls rows. The accumulator is only complete
/// once the returned iterator is drained.
pub fn face_rows<'a>(
    records: impl Iterator<Item = Result<SourceFaceRecord, ReloadError>> + 'a,
    acc: &'a mut SolidAccumulator,
) -> impl Iterator<Item = Result<BuildingFace, ReloadError>> + 'a {
    records.map(move |record| {
        let SourceFaceRecord {
            id,
            uri,
            solid_uri,
            kind,
            detail_level,
            begin_validity,
            end_validity,
            geometry,
        } = record?;

        let building_face_id = parse_id(&uri, UriBase::BuildingFace)?;
        let building_solid_id = parse_id(&solid_uri, UriBase::BuildingSolid)?;

        let solid = acc
            .solids
            .entry(building_solid_id)
            .or_insert_with(|| BuildingSolid {
                building_solid_id,
                point: None,
            });

        let kind = BuildingFaceKind::from_source(&kind)?;
        let geometry = to_multipolygon_3d(geometry);

        if kind == BuildingFaceKind::GroundSurface {
            match ground_point(&geometry) {
                Ok(centroid) => {
                    if solid.point.is_some() {
                        // The source is assumed to carry one ground surface
                        // per solid; when it does not, the last one wins.
                        debug!(
                            building_solid_id,
                            "multiple ground surfaces for solid, overwriting representative point"
                        );
                    }
                    solid.point = Some(centroid);
                    acc.degenerate_grounds.remove(&building_solid_id);
                }
                Err(err) => {
                    warn!(
                        building_solid_id,
                        building_face_id,
                        error = %err,
                        "ground surface centroid failed, solid keeps no representative point"
                    );
                    if solid.point.is_none() {
                        acc.degenerate_grounds.insert(building_solid_id);
                    }
                }
            }
        }

        Ok(BuildingFace {
            id,
            building_face_id,
            building_solid_id,
            kind,
            detail_level,
            begin_validity,
            end_validity,
            geometry,
        })
    })
}

/// Representative point of a ground-surface face: the vertex centroid, but
/// only for faces with a well-defined plane. A collinear or zero-area ring
/// yields no trustworthy point, so the normal is checked first.
fn ground_point(geometry: &MultiPolygon3) -> Result<Vertex3, GeometryError> {
    let first = geometry.0.first().ok_or(GeometryError::EmptyGeometry)?;
    geomkit::newell_normal(&first.exterior)?;
    geomkit::centroid_3d(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::in_memory;
    use chrono::NaiveDate;

    fn face(id: i64, solid: i64, kind: &str, ring: Vec<[f64; 3]>) -> SourceFaceRecord {
        SourceFaceRecord {
            id,
            uri: format!("https://databrussels.be/id/buildingface/{id}"),
            solid_uri: format!("https://databrussels.be/id/buildingsolid/{solid}"),
            kind: kind.to_owned(),
            detail_level: 2,
            begin_validity: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            end_validity: None,
            geometry: vec![vec![ring]],
        }
    }

    fn unit_square() -> Vec<[f64; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ]
    }

    #[test]
    fn ground_surface_sets_the_representative_point() {
        let mut acc = SolidAccumulator::default();
        let faces: Vec<_> = face_rows(
            in_memory(vec![
                face(1, 100, "GROUNDSURFACE", unit_square()),
                face(2, 100, "WALLSURFACE", vec![
                    [0.0, 0.0, 0.0],
                    [1.0, 0.0, 0.0],
                    [1.0, 0.0, 3.0],
                    [0.0, 0.0, 3.0],
                ]),
            ]),
            &mut acc,
        )
        .collect::<Result<_, _>>()
        .unwrap();

        assert_eq!(faces.len(), 2);
        assert!(faces.iter().all(|f| f.building_solid_id == 100));

        let solid = &acc.solids[&100];
        let point = solid.point.unwrap();
        assert!((point[0] - 0.5).abs() < 1e-9);
        assert!((point[1] - 0.5).abs() < 1e-9);
        assert!(point[2].abs() < 1e-9);
    }

    #[test]
    fn solid_without_ground_surface_keeps_null_point() {
        let mut acc = SolidAccumulator::default();
        let faces: Vec<_> = face_rows(
            in_memory(vec![face(1, 200, "ROOFSURFACE", unit_square())]),
            &mut acc,
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(acc.solids[&200].point, None);
        assert!(!acc.degenerate_grounds.contains(&200));
    }

    #[test]
    fn degenerate_ground_surface_is_recorded_not_fatal() {
        let mut acc = SolidAccumulator::default();
        let degenerate = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        let faces: Vec<_> = face_rows(
            in_memory(vec![face(1, 300, "GROUNDSURFACE", degenerate)]),
            &mut acc,
        )
        .collect::<Result<_, _>>()
        .unwrap();
        assert_eq!(faces.len(), 1);
        assert_eq!(acc.solids[&300].point, None);
        assert!(acc.degenerate_grounds.contains(&300));
    }

    #[test]
    fn later_ground_surface_wins() {
        let mut acc = SolidAccumulator::default();
        let shifted: Vec<[f64; 3]> = unit_square()
            .into_iter()
            .map(|[x, y, z]| [x + 10.0, y, z])
            .collect();
        let _: Vec<_> = face_rows(
            in_memory(vec![
                face(1, 100, "GROUNDSURFACE", unit_square()),
                face(2, 100, "GROUNDSURFACE", shifted),
            ]),
            &mut acc,
        )
        .collect::<Result<_, _>>()
        .unwrap();
        let point = acc.solids[&100].point.unwrap();
        assert!((point[0] - 10.5).abs() < 1e-9);
    }

    #[test]
    fn malformed_solid_uri_is_fatal() {
        let mut acc = SolidAccumulator::default();
        let mut bad = face(1, 100, "WALLSURFACE", unit_square());
        bad.solid_uri = "https://databrussels.be/id/building/100".to_owned();
        let result: Result<Vec<_>, _> = face_rows(in_memory(vec![bad]), &mut acc).collect();
        assert!(matches!(
            result.unwrap_err(),
            ReloadError::MalformedIdentifier { .. }
        ));
    }
}
