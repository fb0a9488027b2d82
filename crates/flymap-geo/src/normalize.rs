//! Marker normalization: heterogeneous specs to validated positions.
//!
//! One pure rule set serves two call sites with different failure policies:
//! the render path skips a bad marker and logs, the authoring-validation
//! path aborts the build. Both go through [`normalize`].

use crate::regions::RegionDirectory;
use flymap_core::{CanonicalMarker, GeoPoint, InputError, MarkerGroup, MarkerSpec};

/// Resolves a marker spec to a validated [`GeoPoint`].
///
/// Rules, in order:
/// 1. Region code: directory lookup; not-found names the offending code.
/// 2. Coordinate pair: treated as `(lat, lng)`, range-checked.
/// 3. Labeled coordinate: must carry a non-empty label and a pair per rule 2.
///
/// Anything that matches none of the [`MarkerSpec`] shapes is rejected at
/// deserialization, before this function is reached.
pub fn normalize(spec: &MarkerSpec, directory: &RegionDirectory) -> Result<GeoPoint, InputError> {
    match spec {
        MarkerSpec::RegionCode(code) => directory
            .lookup(code)
            .map(|entry| entry.point)
            .ok_or_else(|| InputError::unknown_region(code.clone())),
        MarkerSpec::Coordinate(lat, lng) => GeoPoint::new(*lat, *lng),
        MarkerSpec::LabeledCoordinate { label, coordinates } => {
            if label.is_empty() {
                return Err(InputError::missing_field("label"));
            }
            GeoPoint::new(coordinates.0, coordinates.1)
        }
    }
}

/// Resolves one group member into a renderer-addressable marker.
///
/// The id is derived from the group id and the marker's current list
/// position, matching the wire format's `(group_id, index)` addressing.
pub fn canonicalize(
    group_id: &str,
    index: usize,
    spec: &MarkerSpec,
    directory: &RegionDirectory,
) -> Result<CanonicalMarker, InputError> {
    let point = normalize(spec, directory)?;
    let label = match spec {
        MarkerSpec::RegionCode(code) => directory.name(code).map(str::to_string),
        MarkerSpec::Coordinate(..) => None,
        MarkerSpec::LabeledCoordinate { label, .. } => Some(label.clone()),
    };

    Ok(CanonicalMarker {
        id: CanonicalMarker::derive_id(group_id, index),
        point,
        label,
        style_key: None,
        style_override: None,
    })
}

/// Resolves every marker in a group, pairing each with its outcome.
///
/// Does not apply a failure policy; callers iterate and decide whether an
/// error skips the marker or aborts the batch.
pub fn canonicalize_group<'a>(
    group: &'a MarkerGroup,
    directory: &'a RegionDirectory,
) -> impl Iterator<Item = (usize, Result<CanonicalMarker, InputError>)> + 'a {
    group
        .markers
        .iter()
        .enumerate()
        .map(move |(index, spec)| (index, canonicalize(&group.id, index, spec, directory)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> RegionDirectory {
        RegionDirectory::builtin().unwrap()
    }

    #[test]
    fn test_region_code_resolves() {
        let point = normalize(&MarkerSpec::RegionCode("sjc".to_string()), &directory()).unwrap();
        assert_eq!(point.lat(), 37.3382);
    }

    #[test]
    fn test_unknown_code_names_offender() {
        let err = normalize(
            &MarkerSpec::RegionCode("xyz-invalid".to_string()),
            &directory(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("xyz-invalid"));
    }

    #[test]
    fn test_round_trip_code_and_pair_agree() {
        let dir = directory();
        let via_code = normalize(&MarkerSpec::RegionCode("fra".to_string()), &dir).unwrap();
        let via_pair = normalize(
            &MarkerSpec::Coordinate(via_code.lat(), via_code.lng()),
            &dir,
        )
        .unwrap();
        assert_eq!(via_code, via_pair);
    }

    #[test]
    fn test_out_of_range_pair_rejected() {
        let err = normalize(&MarkerSpec::Coordinate(200.0, 0.0), &directory()).unwrap_err();
        assert!(matches!(err, InputError::InvalidLatitude(_)));
    }

    #[test]
    fn test_labeled_coordinate_requires_label() {
        let err = normalize(
            &MarkerSpec::LabeledCoordinate {
                label: String::new(),
                coordinates: (10.0, 20.0),
            },
            &directory(),
        )
        .unwrap_err();
        assert!(matches!(err, InputError::MissingField { .. }));
    }

    #[test]
    fn test_canonicalize_carries_labels() {
        let dir = directory();
        let marker = canonicalize("prod", 0, &MarkerSpec::RegionCode("lhr".to_string()), &dir)
            .unwrap();
        assert_eq!(marker.id, "prod-0");
        assert_eq!(marker.label.as_deref(), Some("London, United Kingdom"));

        let adhoc = canonicalize(
            "prod",
            1,
            &MarkerSpec::LabeledCoordinate {
                label: "HQ".to_string(),
                coordinates: (52.52, 13.40),
            },
            &dir,
        )
        .unwrap();
        assert_eq!(adhoc.label.as_deref(), Some("HQ"));
    }

    #[test]
    fn test_canonicalize_group_reports_per_marker() {
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![
            MarkerSpec::RegionCode("sjc".to_string()),
            MarkerSpec::Coordinate(200.0, 0.0),
            MarkerSpec::RegionCode("fra".to_string()),
        ];
        let results: Vec<_> = canonicalize_group(&group, &directory()).collect();
        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert!(results[2].1.is_ok());
        assert_eq!(results[2].1.as_ref().unwrap().id, "prod-2");
    }
}
