//! Source identifier parsing.
//!
//! Every cross-record reference in the source packages is a URI of the form
//! `<fixed prefix><integer>`, one prefix per entity kind. Recovering the
//! numeric id means stripping the known prefix and parsing the decimal
//! remainder; anything else is a hard failure that aborts the reload, since
//! a mis-parsed id would propagate into foreign keys.

use crate::ReloadError;

/// The per-kind URI prefixes carried by source references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UriBase {
    Address,
    Block,
    Building,
    BuildingFace,
    BuildingSolid,
    CadastralParcel,
    Municipality,
    StreetName,
}

impl UriBase {
    pub const fn prefix(self) -> &'static str {
        match self {
            UriBase::Address => "https://databrussels.be/id/address/",
            UriBase::Block => "https://databrussels.be/id/block/",
            UriBase::Building => "https://databrussels.be/id/building/",
            UriBase::BuildingFace => "https://databrussels.be/id/buildingface/",
            UriBase::BuildingSolid => "https://databrussels.be/id/buildingsolid/",
            UriBase::CadastralParcel => "https://databrussels.be/id/cadastralparcel/",
            UriBase::Municipality => "https://databrussels.be/id/municipality/",
            UriBase::StreetName => "https://databrussels.be/id/streetname/",
        }
    }
}

/// Strips the prefix for `base` and parses the remainder as a decimal id.
pub fn parse_id(uri: &str, base: UriBase) -> Result<i64, ReloadError> {
    let malformed = || ReloadError::MalformedIdentifier {
        uri: uri.to_owned(),
        expected: base.prefix(),
    };
    let rest = uri.strip_prefix(base.prefix()).ok_or_else(malformed)?;
    rest.parse::<i64>().map_err(|_| malformed())
}

/// Whether an optional source reference actually references something.
///
/// The packages encode "no reference" as an empty/whitespace value or as the
/// bare prefix (a URI ending in `/`).
fn is_populated(value: &str) -> bool {
    let trimmed = value.trim();
    !trimmed.is_empty() && !trimmed.ends_with('/')
}

/// Parses an optional reference: absent values yield `None`, populated
/// values must parse like [`parse_id`] or the reload aborts.
pub fn parse_optional_id(uri: Option<&str>, base: UriBase) -> Result<Option<i64>, ReloadError> {
    match uri {
        Some(value) if is_populated(value) => parse_id(value, base).map(Some),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_uri() {
        let id = parse_id(
            "https://databrussels.be/id/buildingsolid/100",
            UriBase::BuildingSolid,
        )
        .unwrap();
        assert_eq!(id, 100);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let err = parse_id(
            "https://databrussels.be/id/building/100",
            UriBase::BuildingSolid,
        )
        .unwrap_err();
        assert!(matches!(err, ReloadError::MalformedIdentifier { .. }));
    }

    #[test]
    fn rejects_non_integer_remainder() {
        let err = parse_id(
            "https://databrussels.be/id/address/12a",
            UriBase::Address,
        )
        .unwrap_err();
        assert!(matches!(err, ReloadError::MalformedIdentifier { .. }));
    }

    #[test]
    fn optional_reference_absent_forms() {
        for absent in [None, Some(""), Some("   "), Some("https://databrussels.be/id/block/")] {
            assert_eq!(parse_optional_id(absent, UriBase::Block).unwrap(), None);
        }
    }

    #[test]
    fn optional_reference_populated_but_malformed_is_fatal() {
        let err = parse_optional_id(Some("not-a-uri"), UriBase::Block).unwrap_err();
        assert!(matches!(err, ReloadError::MalformedIdentifier { .. }));
    }
}
