//! Dataset store and reload engine for the regional basemap.
//!
//! The store holds a small, fixed set of entity tables (addresses, streets,
//! municipalities, buildings, cadastral parcels, 3D building faces/solids,
//! forbidden construction zones) in SQLite, all geometry in Belgian
//! Lambert 72. Every reload is a full replace: source packages are streamed
//! into generation-qualified staging tables, indexed, and published by a
//! single catalog transaction so concurrent readers never observe a
//! partially-migrated state.
//!
//! Module map:
//! - [`ids`] — URI-style source identifiers and fail-closed numeric parsing.
//! - [`entities`] — the persisted entity rows.
//! - [`source`] — typed source records and the package directory adapter.
//! - [`normalize`] — single-pass dimension dedup and entity normalization.
//! - [`solids`] — building-solid reconstruction from face streams.
//! - [`forbidden`] — exclusion-zone loading and the tri-state decision.
//! - [`store`] — SQLite store, staging, bulk load, indexing, catalog swap.
//! - [`reload`] — the two dataset-group pipelines.

pub mod entities;
pub mod forbidden;
pub mod ids;
pub mod normalize;
pub mod reload;
pub mod solids;
pub mod source;
pub mod store;

mod progress;

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a reload. Per-geometry computation failures are NOT
/// represented here: those are scoped to the single computation, recorded,
/// and the reload continues (see [`forbidden::ExclusionDecision`]).
#[derive(Debug, Error)]
pub enum ReloadError {
    /// A source reference did not match `<prefix><integer>`. Fatal:
    /// downstream foreign keys would silently be wrong.
    #[error("malformed identifier `{uri}`: expected `{expected}<integer>`")]
    MalformedIdentifier { uri: String, expected: &'static str },

    /// A face record carried a classification outside the known set.
    #[error("unknown building face kind `{value}`")]
    UnknownFaceKind { value: String },

    #[error("package file {}: {source}", path.display())]
    PackageIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("package file {}, line {line}: {source}", path.display())]
    PackageRecord {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("forbidden zone file {}: {source}", path.display())]
    ForbiddenZone {
        path: PathBuf,
        #[source]
        source: geomkit::wkt::WktError,
    },

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),
}
