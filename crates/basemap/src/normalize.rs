//! Single-pass entity normalization.
//!
//! The source rows are denormalized: street and municipality attributes
//! repeat on every address record. One streaming pass materializes each
//! dimension entity on first sight of its id and ignores later sightings;
//! the reload-scoped [`DimensionCache`] carries those maps plus the
//! parcel-key index, and is discarded after staging.
//!
//! Load order is a hard dependency, not a convention: the address pass
//! resolves parcel keys against the map the parcel pass populates, so
//! [`parcel_rows`] must be drained before [`address_rows`] is constructed
//! from the same cache.

use crate::entities::{Address, Building, CadastralParcel, Municipality, Street};
use crate::ids::{parse_id, parse_optional_id, UriBase};
use crate::source::{
    to_multipolygon_2d, SourceAddressRecord, SourceBuildingRecord, SourceParcelRecord,
};
use crate::ReloadError;
use std::collections::{BTreeMap, HashMap};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Reload-scoped state threaded through the normalization passes.
///
/// First occurrence wins for the dimension maps; `BTreeMap` keeps the later
/// dimension bulk-load deterministic across runs.
#[derive(Debug, Default)]
pub struct DimensionCache {
    pub municipalities: BTreeMap<i64, Municipality>,
    pub streets: BTreeMap<i64, Street>,
    /// parcel key -> cadastral parcel numeric id, populated by the parcel pass.
    pub parcel_keys: HashMap<String, i64>,
}

/// Normalizes street/municipality names for the external matcher: lowercase,
/// accents folded (NFD, combining marks dropped), common street-type
/// abbreviations expanded token-wise, whitespace collapsed.
pub fn clean_street_name(raw: &str) -> String {
    let folded: String = raw
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let mut out = String::with_capacity(folded.len());
    for token in folded.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(&expand_token(token));
    }
    out
}

/// Token-wise abbreviation expansion. French abbreviations are standalone
/// tokens; the Dutch ones are suffixes glued to the street name.
fn expand_token(token: &str) -> String {
    let bare = token.trim_end_matches('.');
    match bare {
        "av" => return "avenue".to_owned(),
        "bd" | "blvd" => return "boulevard".to_owned(),
        "ch" => return "chaussee".to_owned(),
        "rte" => return "route".to_owned(),
        "pl" => return "place".to_owned(),
        "st" => return "saint".to_owned(),
        "ste" => return "sainte".to_owned(),
        _ => {}
    }
    for (suffix, full) in [("str", "straat"), ("ln", "laan"), ("stwg", "steenweg")] {
        if let Some(stem) = bare.strip_suffix(suffix) {
            if !stem.is_empty() {
                return format!("{stem}{full}");
            }
        }
    }
    bare.to_owned()
}

/// Streams cadastral parcel rows, populating the parcel-key map as a side
/// effect. Must run before the address pass.
pub fn parcel_rows<'a>(
    records: impl Iterator<Item = Result<SourceParcelRecord, ReloadError>> + 'a,
    cache: &'a mut DimensionCache,
) -> impl Iterator<Item = Result<CadastralParcel, ReloadError>> + 'a {
    records.map(move |record| {
        let record = record?;
        let cadastral_parcel_id = parse_id(&record.uri, UriBase::CadastralParcel)?;

        cache
            .parcel_keys
            .insert(record.parcel_key.clone(), cadastral_parcel_id);

        let municipality_id = match record.municipality_code.as_deref() {
            Some(code) if !code.trim().is_empty() => Some(
                code.trim()
                    .parse::<i64>()
                    .map_err(|_| ReloadError::MalformedIdentifier {
                        uri: code.to_owned(),
                        expected: "",
                    })?,
            ),
            _ => None,
        };

        Ok(CadastralParcel {
            id: record.id,
            cadastral_parcel_id,
            cadastral_division: record.cadastral_division,
            municipality_id,
            area: record.area,
            parcel_type: record.parcel_type,
            parcel_key: record.parcel_key,
            geometry: to_multipolygon_2d(record.geometry),
        })
    })
}

/// Streams address rows, materializing street and municipality dimension
/// entities on first sight and resolving parcel keys against the map the
/// parcel pass left in the cache.
pub fn address_rows<'a>(
    records: impl Iterator<Item = Result<SourceAddressRecord, ReloadError>> + 'a,
    cache: &'a mut DimensionCache,
) -> impl Iterator<Item = Result<Address, ReloadError>> + 'a {
    records.map(move |record| {
        let record = record?;
        let address_id = parse_id(&record.uri, UriBase::Address)?;

        let municipality_id = parse_id(&record.municipality_uri, UriBase::Municipality)?;
        cache
            .municipalities
            .entry(municipality_id)
            .or_insert_with(|| Municipality {
                municipality_id,
                name_dutch: record.municipality_name_dutch.clone(),
                name_french: record.municipality_name_french.clone(),
            });

        let street_id = parse_id(&record.street_uri, UriBase::StreetName)?;
        cache.streets.entry(street_id).or_insert_with(|| Street {
            street_id,
            name_dutch: record.street_name_dutch.clone(),
            name_french: record.street_name_french.clone(),
            cleaned_name_dutch: clean_street_name(&record.street_name_dutch),
            cleaned_name_french: clean_street_name(&record.street_name_french),
        });

        let cadastral_parcel_id = record
            .parcel_key
            .as_deref()
            .and_then(|key| cache.parcel_keys.get(key).copied());

        Ok(Address {
            id: record.id,
            address_id,
            street_id,
            municipality_id,
            parent_id: parse_optional_id(record.parent_uri.as_deref(), UriBase::Address)?,
            cadastral_parcel_id,
            building_id: parse_optional_id(record.building_uri.as_deref(), UriBase::Building)?,
            carto_angle: record.carto_angle,
            postal_code: record.postal_code,
            police_number: record.police_number,
            box_number: record.box_number,
            stat_nis_code: record.stat_nis_code,
            position: [record.x, record.y],
            geometry: record.geometry,
        })
    })
}

/// Streams building rows. No dimension state involved.
pub fn building_rows<'a>(
    records: impl Iterator<Item = Result<SourceBuildingRecord, ReloadError>> + 'a,
) -> impl Iterator<Item = Result<Building, ReloadError>> + 'a {
    records.map(|record| {
        let record = record?;
        Ok(Building {
            id: record.id,
            building_id: parse_id(&record.uri, UriBase::Building)?,
            block_id: parse_optional_id(record.block_uri.as_deref(), UriBase::Block)?,
            area: record.area,
            geometry: to_multipolygon_2d(record.geometry),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::in_memory;

    fn address_record(id: i64, street_id: i64, street_dutch: &str) -> SourceAddressRecord {
        SourceAddressRecord {
            id,
            uri: format!("https://databrussels.be/id/address/{id}"),
            street_uri: format!("https://databrussels.be/id/streetname/{street_id}"),
            street_name_dutch: street_dutch.to_owned(),
            street_name_french: "Rue de la Loi".to_owned(),
            municipality_uri: "https://databrussels.be/id/municipality/21004".to_owned(),
            municipality_name_dutch: "Brussel".to_owned(),
            municipality_name_french: "Bruxelles".to_owned(),
            parent_uri: None,
            building_uri: None,
            parcel_key: Some("21004A0001/00X000".to_owned()),
            carto_angle: Some(0.0),
            postal_code: 1000,
            police_number: "16".to_owned(),
            box_number: None,
            stat_nis_code: "21004".to_owned(),
            x: 148_858.0,
            y: 171_175.0,
            geometry: vec![[148_858.0, 171_175.0]],
        }
    }

    #[test]
    fn cleans_accents_case_and_abbreviations() {
        assert_eq!(clean_street_name("Av. Léopold III"), "avenue leopold iii");
        assert_eq!(clean_street_name("  Kerkstr.  "), "kerkstraat");
        assert_eq!(clean_street_name("Bd du Régent"), "boulevard du regent");
    }

    #[test]
    fn first_street_occurrence_wins() {
        let mut cache = DimensionCache::default();
        let records = in_memory(vec![
            address_record(1, 7, "Wetstraat"),
            address_record(2, 7, "Ander Naam"),
        ]);
        let rows: Vec<_> = address_rows(records, &mut cache)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(cache.streets.len(), 1);
        assert_eq!(cache.streets[&7].name_dutch, "Wetstraat");
    }

    #[test]
    fn parcel_key_resolution_requires_parcel_pass_first() {
        let mut cache = DimensionCache::default();
        cache.parcel_keys.insert("21004A0001/00X000".to_owned(), 5512);

        let rows: Vec<_> = address_rows(in_memory(vec![address_record(1, 7, "Wetstraat")]), &mut cache)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].cadastral_parcel_id, Some(5512));

        // An unresolvable key is tolerated, not fatal.
        let mut empty = DimensionCache::default();
        let rows: Vec<_> = address_rows(in_memory(vec![address_record(1, 7, "Wetstraat")]), &mut empty)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows[0].cadastral_parcel_id, None);
    }

    #[test]
    fn malformed_street_uri_aborts_the_pass() {
        let mut cache = DimensionCache::default();
        let mut bad = address_record(1, 7, "Wetstraat");
        bad.street_uri = "https://databrussels.be/id/streetname/none".to_owned();
        let result: Result<Vec<_>, _> = address_rows(in_memory(vec![bad]), &mut cache).collect();
        assert!(matches!(
            result.unwrap_err(),
            ReloadError::MalformedIdentifier { .. }
        ));
    }
}
