//! The two dataset-group reload pipelines.
//!
//! Each pipeline is the full shadow-generation protocol: stage, bulk-load,
//! cross-cutting transforms, index build, catalog swap. Everything before
//! the swap only touches staged tables, so a failure anywhere leaves the
//! published generation untouched; the caller just retries.

use crate::forbidden::{load_forbidden_dir, ForbiddenZones};
use crate::normalize::{address_rows, building_rows, parcel_rows, DimensionCache};
use crate::solids::{face_rows, SolidAccumulator};
use crate::source::PackageDir;
use crate::store::spec::{DatasetGroup, BUILDING_FACE, BUILDING_SOLID};
use crate::store::Store;
use crate::{entities::ForbiddenArea, ReloadError};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// Outcome of one reload, reported to the trigger caller.
#[derive(Debug, Serialize)]
pub struct ReloadReport {
    pub dataset_group: &'static str,
    pub generation: i64,
    /// Inserted rows per entity table (before cross-cutting deletes).
    pub inserted: BTreeMap<&'static str, u64>,
    pub excluded_solids: u64,
    /// Solids retained fail-open after a geometry computation failure.
    pub exclusion_failures: u64,
}

/// Full reload of the parcel/building group.
///
/// Parcels are loaded first: the address pass resolves its parcel lookup
/// keys against the map the parcel pass populates, so the order of these
/// two loads is a correctness requirement, not a style choice. The
/// street/municipality dimensions fall out of the address pass and are
/// loaded last.
pub fn reload_parcel_and_building(
    store: &mut Store,
    package: &PackageDir,
) -> Result<ReloadReport, ReloadError> {
    let generation = store.begin_generation(DatasetGroup::ParcelAndBuilding)?;
    info!(
        group = generation.group.name(),
        generation = generation.number,
        "reload started"
    );

    for spec in generation.group.tables() {
        store.stage(&generation, spec)?;
    }

    let mut cache = DimensionCache::default();
    let mut inserted = BTreeMap::new();

    let parcels = package.parcels()?;
    inserted.insert(
        "cadastral_parcel",
        store.bulk_load(&generation, parcel_rows(parcels, &mut cache))?,
    );

    let addresses = package.addresses()?;
    inserted.insert(
        "address",
        store.bulk_load(&generation, address_rows(addresses, &mut cache))?,
    );

    inserted.insert(
        "building",
        store.bulk_load(&generation, building_rows(package.buildings()?))?,
    );

    inserted.insert(
        "municipality",
        store.bulk_load(&generation, cache.municipalities.values().cloned().map(Ok))?,
    );
    inserted.insert(
        "street",
        store.bulk_load(&generation, cache.streets.values().cloned().map(Ok))?,
    );

    for spec in generation.group.tables() {
        store.build_indexes(&generation, spec)?;
    }
    store.swap(&generation)?;

    Ok(ReloadReport {
        dataset_group: generation.group.name(),
        generation: generation.number,
        inserted,
        excluded_solids: 0,
        exclusion_failures: 0,
    })
}

/// Full reload of the 3D construction group.
///
/// The face stream rebuilds the solid set while it is being loaded; solids
/// are flushed afterwards, then the forbidden-zone cascade removes excluded
/// solids and their faces from the staged tables before indexing.
pub fn reload_construction_3d(
    store: &mut Store,
    package: &PackageDir,
    forbidden_dir: &Path,
) -> Result<ReloadReport, ReloadError> {
    let generation = store.begin_generation(DatasetGroup::Construction3d)?;
    info!(
        group = generation.group.name(),
        generation = generation.number,
        "reload started"
    );

    for spec in generation.group.tables() {
        store.stage(&generation, spec)?;
    }

    let zones = load_forbidden_dir(forbidden_dir)?;

    let mut acc = SolidAccumulator::default();
    let mut inserted = BTreeMap::new();

    let faces = package.building_faces()?;
    inserted.insert(
        "building_face",
        store.bulk_load(&generation, face_rows(faces, &mut acc))?,
    );
    inserted.insert(
        "building_solid",
        store.bulk_load(&generation, acc.solids.values().cloned().map(Ok))?,
    );
    inserted.insert(
        "forbidden_area",
        store.bulk_load(
            &generation,
            zones.iter().cloned().enumerate().map(|(id, polygon)| {
                Ok(ForbiddenArea {
                    id: id as i64,
                    polygon,
                })
            }),
        )?,
    );

    let exclusion = ForbiddenZones::new(zones).assess(&acc);
    store.delete_where_in(
        &generation,
        &BUILDING_SOLID,
        "building_solid_id",
        &exclusion.excluded,
    )?;
    store.delete_where_in(
        &generation,
        &BUILDING_FACE,
        "building_solid_id",
        &exclusion.excluded,
    )?;

    for spec in generation.group.tables() {
        store.build_indexes(&generation, spec)?;
    }
    store.swap(&generation)?;

    Ok(ReloadReport {
        dataset_group: generation.group.name(),
        generation: generation.number,
        inserted,
        excluded_solids: exclusion.excluded.len() as u64,
        exclusion_failures: exclusion.included_after_error,
    })
}
