//! Structural validation of inbound payloads.
//!
//! Runs before an event touches mirror state, so a failing event can be
//! dropped whole and the mirror never ends up partially applied.

use crate::message::{MarkerAddPayload, MarkerStatePayload, MarkerUpdatePayload};
use flymap_core::{MarkerGroup, MarkerSpec, ProtocolError};
use flymap_geo::{normalize, RegionDirectory};

/// Validates a full-state payload: every group has an id, every style is
/// well-formed, every marker normalizes.
pub fn validate_state(
    payload: &MarkerStatePayload,
    directory: &RegionDirectory,
) -> Result<(), ProtocolError> {
    for (index, group) in payload.marker_groups.iter().enumerate() {
        if group.id.is_empty() {
            return Err(ProtocolError::MissingGroupId { index });
        }
        validate_group(group, directory)?;
    }
    Ok(())
}

/// Validates a group-update payload against the same marker rules.
pub fn validate_update(
    payload: &MarkerUpdatePayload,
    directory: &RegionDirectory,
) -> Result<(), ProtocolError> {
    if payload.group_id.is_empty() {
        return Err(ProtocolError::MissingGroupId { index: 0 });
    }
    validate_markers(&payload.group_id, &payload.markers, directory)
}

/// Validates a single-marker add.
pub fn validate_add(
    payload: &MarkerAddPayload,
    directory: &RegionDirectory,
) -> Result<(), ProtocolError> {
    if payload.group_id.is_empty() {
        return Err(ProtocolError::MissingGroupId { index: 0 });
    }
    validate_markers(
        &payload.group_id,
        std::slice::from_ref(&payload.marker),
        directory,
    )
}

fn validate_group(group: &MarkerGroup, directory: &RegionDirectory) -> Result<(), ProtocolError> {
    group.style.validate().map_err(|source| {
        ProtocolError::InvalidMarker {
            group_id: group.id.clone(),
            index: 0,
            source,
        }
    })?;
    validate_markers(&group.id, &group.markers, directory)
}

fn validate_markers(
    group_id: &str,
    markers: &[MarkerSpec],
    directory: &RegionDirectory,
) -> Result<(), ProtocolError> {
    for (index, spec) in markers.iter().enumerate() {
        normalize(spec, directory).map_err(|source| ProtocolError::InvalidMarker {
            group_id: group_id.to_string(),
            index,
            source,
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::SessionConfig;
    use flymap_core::Theme;

    fn directory() -> RegionDirectory {
        RegionDirectory::builtin().unwrap()
    }

    fn state_with(groups: Vec<MarkerGroup>) -> MarkerStatePayload {
        MarkerStatePayload {
            marker_groups: groups,
            theme: Theme::default(),
            config: SessionConfig::default(),
        }
    }

    #[test]
    fn test_valid_state_accepted() {
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![
            MarkerSpec::RegionCode("sjc".to_string()),
            MarkerSpec::Coordinate(51.5, -0.12),
        ];
        assert!(validate_state(&state_with(vec![group]), &directory()).is_ok());
    }

    #[test]
    fn test_missing_group_id_rejected() {
        let group = MarkerGroup::new("", "Anonymous");
        let err = validate_state(&state_with(vec![group]), &directory()).unwrap_err();
        assert!(matches!(err, ProtocolError::MissingGroupId { index: 0 }));
    }

    #[test]
    fn test_out_of_range_marker_rejected() {
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![MarkerSpec::Coordinate(200.0, 0.0)];
        let err = validate_state(&state_with(vec![group]), &directory()).unwrap_err();
        let ProtocolError::InvalidMarker { group_id, index, .. } = err else {
            panic!("expected InvalidMarker");
        };
        assert_eq!(group_id, "prod");
        assert_eq!(index, 0);
    }

    #[test]
    fn test_update_validation() {
        let payload = MarkerUpdatePayload {
            group_id: "prod".to_string(),
            markers: vec![MarkerSpec::RegionCode("lhr".to_string())],
        };
        assert!(validate_update(&payload, &directory()).is_ok());

        let bad = MarkerUpdatePayload {
            group_id: "prod".to_string(),
            markers: vec![MarkerSpec::RegionCode("xyz-invalid".to_string())],
        };
        assert!(validate_update(&bad, &directory()).is_err());
    }

    #[test]
    fn test_add_validation() {
        let payload = MarkerAddPayload {
            group_id: "prod".to_string(),
            marker: MarkerSpec::Coordinate(1.35, 103.82),
        };
        assert!(validate_add(&payload, &directory()).is_ok());
    }
}
