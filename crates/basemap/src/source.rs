//! Typed source records and the package directory adapter.
//!
//! The raw vendor format is out of scope: a package here is a directory with
//! one JSON Lines file per collection, each line one record. Geometry comes
//! as nested coordinate arrays (polygons are rings of vertices, the first
//! ring the exterior), already in the working reference system except where
//! noted.

use crate::ReloadError;
use chrono::NaiveDate;
use geomkit::{MultiPolygon2, MultiPolygon3, Polygon2, Polygon3, Vertex2, Vertex3};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// Raw multipolygon coordinates: polygons, rings, vertices.
pub type RawMultiPolygon2 = Vec<Vec<Vec<Vertex2>>>;
pub type RawMultiPolygon3 = Vec<Vec<Vec<Vertex3>>>;

pub fn to_multipolygon_2d(raw: RawMultiPolygon2) -> MultiPolygon2 {
    MultiPolygon2(
        raw.into_iter()
            .map(|mut rings| {
                let exterior = if rings.is_empty() { Vec::new() } else { rings.remove(0) };
                Polygon2 {
                    exterior,
                    interiors: rings,
                }
            })
            .collect(),
    )
}

pub fn to_multipolygon_3d(raw: RawMultiPolygon3) -> MultiPolygon3 {
    MultiPolygon3(
        raw.into_iter()
            .map(|mut rings| {
                let exterior = if rings.is_empty() { Vec::new() } else { rings.remove(0) };
                Polygon3 {
                    exterior,
                    interiors: rings,
                }
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceParcelRecord {
    pub id: i64,
    pub uri: String,
    pub parcel_key: String,
    pub parcel_type: String,
    pub cadastral_division: i64,
    /// Bare municipality NIS code; empty when unknown.
    pub municipality_code: Option<String>,
    pub area: f64,
    pub geometry: RawMultiPolygon2,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceAddressRecord {
    pub id: i64,
    pub uri: String,
    pub street_uri: String,
    pub street_name_dutch: String,
    pub street_name_french: String,
    pub municipality_uri: String,
    pub municipality_name_dutch: String,
    pub municipality_name_french: String,
    pub parent_uri: Option<String>,
    pub building_uri: Option<String>,
    /// Resolves against the parcel collection processed earlier in the run.
    pub parcel_key: Option<String>,
    pub carto_angle: Option<f64>,
    pub postal_code: u16,
    pub police_number: String,
    pub box_number: Option<String>,
    pub stat_nis_code: String,
    pub x: f64,
    pub y: f64,
    pub geometry: Vec<Vertex2>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceBuildingRecord {
    pub id: i64,
    pub uri: String,
    pub block_uri: Option<String>,
    pub area: f64,
    pub geometry: RawMultiPolygon2,
}

/// An oriented building face, referencing its parent solid by URI.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceFaceRecord {
    pub id: i64,
    pub uri: String,
    pub solid_uri: String,
    pub kind: String,
    pub detail_level: i64,
    pub begin_validity: NaiveDate,
    pub end_validity: Option<NaiveDate>,
    pub geometry: RawMultiPolygon3,
}

/// A source package: a directory with one JSONL file per collection.
pub struct PackageDir {
    root: PathBuf,
}

impl PackageDir {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn parcels(
        &self,
    ) -> Result<impl Iterator<Item = Result<SourceParcelRecord, ReloadError>>, ReloadError> {
        jsonl_records(self.root.join("cadastral_parcels.jsonl"))
    }

    pub fn addresses(
        &self,
    ) -> Result<impl Iterator<Item = Result<SourceAddressRecord, ReloadError>>, ReloadError> {
        jsonl_records(self.root.join("addresses.jsonl"))
    }

    pub fn buildings(
        &self,
    ) -> Result<impl Iterator<Item = Result<SourceBuildingRecord, ReloadError>>, ReloadError> {
        jsonl_records(self.root.join("buildings.jsonl"))
    }

    pub fn building_faces(
        &self,
    ) -> Result<impl Iterator<Item = Result<SourceFaceRecord, ReloadError>>, ReloadError> {
        jsonl_records(self.root.join("building_faces.jsonl"))
    }
}

/// Lazily yields one deserialized record per non-empty line. The reader is
/// pull-based: a record is only parsed when the consumer asks for it, which
/// is what bounds the reload pipeline's memory use.
fn jsonl_records<T: serde::de::DeserializeOwned>(
    path: PathBuf,
) -> Result<impl Iterator<Item = Result<T, ReloadError>>, ReloadError> {
    let file = File::open(&path).map_err(|source| ReloadError::PackageIo {
        path: path.clone(),
        source,
    })?;
    let reader = BufReader::new(file);

    Ok(reader
        .lines()
        .enumerate()
        .filter_map(move |(index, line)| {
            let line_no = index + 1;
            match line {
                Err(source) => Some(Err(ReloadError::PackageIo {
                    path: path.clone(),
                    source,
                })),
                Ok(text) if text.trim().is_empty() => None,
                Ok(text) => Some(serde_json::from_str::<T>(&text).map_err(|source| {
                    ReloadError::PackageRecord {
                        path: path.clone(),
                        line: line_no,
                        source,
                    }
                })),
            }
        }))
}

/// Convenience for tests and callers that already hold records in memory.
pub fn in_memory<T>(records: Vec<T>) -> impl Iterator<Item = Result<T, ReloadError>> {
    records.into_iter().map(Ok)
}
