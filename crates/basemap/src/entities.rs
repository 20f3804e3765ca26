//! Persisted entity rows, one struct per published table.
//!
//! All geometry is in the working planar reference system (Lambert 72,
//! EPSG 31370). Point geometries are kept as coordinate arrays; polygonal
//! geometries use the `geomkit` types and are rendered to WKT at the storage
//! boundary.

use crate::ReloadError;
use chrono::NaiveDate;
use geomkit::{MultiPolygon2, MultiPolygon3, Polygon2, Vertex2, Vertex3};

/// Street dimension, deduplicated per reload (first occurrence wins).
///
/// The cleaned name columns are consumed by the external address matcher;
/// see `normalize::clean_street_name` for the cleaning rules.
#[derive(Debug, Clone, PartialEq)]
pub struct Street {
    pub street_id: i64,
    pub name_dutch: String,
    pub name_french: String,
    pub cleaned_name_dutch: String,
    pub cleaned_name_french: String,
}

/// Municipality dimension, deduplicated per reload.
#[derive(Debug, Clone, PartialEq)]
pub struct Municipality {
    pub municipality_id: i64,
    pub name_dutch: String,
    pub name_french: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Address {
    pub id: i64,
    pub address_id: i64,
    pub street_id: i64,
    pub municipality_id: i64,
    pub parent_id: Option<i64>,
    pub cadastral_parcel_id: Option<i64>,
    pub building_id: Option<i64>,
    pub carto_angle: Option<f64>,
    pub postal_code: u16,
    pub police_number: String,
    pub box_number: Option<String>,
    pub stat_nis_code: String,
    /// The canonical point position.
    pub position: Vertex2,
    /// The full multipoint geometry as delivered by the source.
    pub geometry: Vec<Vertex2>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Building {
    pub id: i64,
    pub building_id: i64,
    pub block_id: Option<i64>,
    pub area: f64,
    pub geometry: MultiPolygon2,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CadastralParcel {
    pub id: i64,
    pub cadastral_parcel_id: i64,
    pub cadastral_division: i64,
    pub municipality_id: Option<i64>,
    pub area: f64,
    /// Opaque two-character source classification, persisted verbatim.
    pub parcel_type: String,
    /// The textual lookup key address records resolve against.
    pub parcel_key: String,
    pub geometry: MultiPolygon2,
}

/// Classification of an oriented building face.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i64)]
pub enum BuildingFaceKind {
    Closure = 0,
    GroundSurface = 1,
    Other = 2,
    OuterCeiling = 3,
    OuterFloor = 4,
    RoofSurface = 5,
    WallSurface = 6,
}

impl BuildingFaceKind {
    /// Parses the source label. Unknown labels abort the reload.
    pub fn from_source(value: &str) -> Result<Self, ReloadError> {
        Ok(match value {
            "CLOSURE" => BuildingFaceKind::Closure,
            "GROUNDSURFACE" => BuildingFaceKind::GroundSurface,
            "OTHER" => BuildingFaceKind::Other,
            "OUTERCEILING" => BuildingFaceKind::OuterCeiling,
            "OUTERFLOOR" => BuildingFaceKind::OuterFloor,
            "ROOFSURFACE" => BuildingFaceKind::RoofSurface,
            "WALLSURFACE" => BuildingFaceKind::WallSurface,
            _ => {
                return Err(ReloadError::UnknownFaceKind {
                    value: value.to_owned(),
                })
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildingFace {
    pub id: i64,
    pub building_face_id: i64,
    /// References a `BuildingSolid` created in the same reload pass.
    pub building_solid_id: i64,
    pub kind: BuildingFaceKind,
    pub detail_level: i64,
    pub begin_validity: NaiveDate,
    pub end_validity: Option<NaiveDate>,
    pub geometry: MultiPolygon3,
}

/// A 3D building envelope, reduced to its representative ground point.
///
/// The point stays `None` until a ground-surface face is seen for the solid;
/// solids that never get one are published with a null geometry, which
/// downstream consumers must tolerate.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildingSolid {
    pub building_solid_id: i64,
    pub point: Option<Vertex3>,
}

/// An administratively excluded construction zone, already reprojected into
/// the working reference system.
#[derive(Debug, Clone, PartialEq)]
pub struct ForbiddenArea {
    pub id: i64,
    pub polygon: Polygon2,
}
