//! Client mirror of server-authoritative map state.
//!
//! The mirror is mutated only by applying inbound events in arrival order.
//! Every event is structurally validated before any mutation, so an event
//! either applies completely or is rejected with the mirror untouched.

use chrono::{DateTime, Utc};
use flymap_core::{CanonicalMarker, MarkerGroup, ProtocolError, Theme};
use flymap_geo::RegionDirectory;
use flymap_wire::{
    validate_add, validate_state, validate_update, ClientStateSummary, InboundEvent, SessionConfig,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What an applied event changed, so the session can re-render the smallest
/// sufficient part of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Everything was replaced; re-render from scratch.
    FullReplace,
    /// One group's marker list was swapped; re-render that group only.
    GroupReplaced { group_id: String },
    /// One marker was appended; render just that marker.
    MarkerAdded { group_id: String, marker_id: String },
    /// One marker was removed. `reindexed` is set when the removal was from
    /// the middle of the list, which shifts the position-derived ids of the
    /// markers behind it; the group must then be re-rendered to keep mirror
    /// and renderer ids in agreement.
    MarkerRemoved {
        group_id: String,
        marker_id: String,
        reindexed: bool,
    },
    /// Theme merged; live style update only, no geometry.
    ThemeChanged,
    /// Display-only visibility flip.
    VisibilityChanged { group_id: String, visible: bool },
    /// Event referenced an unknown group or marker; warned, nothing changed.
    Ignored { reason: String },
}

/// Ephemeral local copy of the server's marker-group state.
///
/// One instance per active session; discarded on teardown or fallback.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MirrorState {
    pub marker_groups: Vec<MarkerGroup>,
    pub theme: Theme,
    pub config: SessionConfig,
    pub last_update: DateTime<Utc>,
}

impl MirrorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total markers across all groups.
    pub fn marker_count(&self) -> usize {
        self.marker_groups.iter().map(|g| g.markers.len()).sum()
    }

    pub fn group(&self, group_id: &str) -> Option<&MarkerGroup> {
        self.marker_groups.iter().find(|g| g.id == group_id)
    }

    fn group_mut(&mut self, group_id: &str) -> Option<&mut MarkerGroup> {
        self.marker_groups.iter_mut().find(|g| g.id == group_id)
    }

    /// Summary sent with a `state_sync` resync request, letting the server
    /// decide whether a full replace is needed.
    pub fn summary(&self) -> ClientStateSummary {
        ClientStateSummary {
            last_update: self.last_update,
            marker_count: self.marker_count(),
        }
    }

    /// Applies one inbound event.
    ///
    /// Validation runs first; a failing event is returned as an error and the
    /// mirror is left exactly as it was. Events referencing unknown groups or
    /// markers apply as warn-level no-ops, not errors.
    pub fn apply(
        &mut self,
        event: &InboundEvent,
        directory: &RegionDirectory,
    ) -> Result<ApplyOutcome, ProtocolError> {
        let outcome = match event {
            InboundEvent::MarkerState(payload) => {
                validate_state(payload, directory)?;
                self.marker_groups = payload.marker_groups.clone();
                self.theme = payload.theme.clone();
                self.config = payload.config.clone();
                ApplyOutcome::FullReplace
            }

            InboundEvent::MarkerUpdate(payload) => {
                validate_update(payload, directory)?;
                match self.group_mut(&payload.group_id) {
                    Some(group) => {
                        group.markers = payload.markers.clone();
                        ApplyOutcome::GroupReplaced {
                            group_id: payload.group_id.clone(),
                        }
                    }
                    None => ignored(format!(
                        "marker_update for unknown group {:?}",
                        payload.group_id
                    )),
                }
            }

            InboundEvent::MarkerAdd(payload) => {
                validate_add(payload, directory)?;
                match self.group_mut(&payload.group_id) {
                    Some(group) => {
                        group.markers.push(payload.marker.clone());
                        let marker_id =
                            CanonicalMarker::derive_id(&group.id, group.markers.len() - 1);
                        ApplyOutcome::MarkerAdded {
                            group_id: payload.group_id.clone(),
                            marker_id,
                        }
                    }
                    None => ignored(format!(
                        "marker_add for unknown group {:?}",
                        payload.group_id
                    )),
                }
            }

            InboundEvent::MarkerRemove(payload) => {
                let index = payload
                    .marker_id
                    .strip_prefix(&format!("{}-", payload.group_id))
                    .and_then(|s| s.parse::<usize>().ok());
                match (self.group_mut(&payload.group_id), index) {
                    (Some(group), Some(index)) if index < group.markers.len() => {
                        group.markers.remove(index);
                        // Removal from the middle shifts every marker behind
                        // it down one position-derived id.
                        let reindexed = index < group.markers.len();
                        ApplyOutcome::MarkerRemoved {
                            group_id: payload.group_id.clone(),
                            marker_id: payload.marker_id.clone(),
                            reindexed,
                        }
                    }
                    _ => ignored(format!(
                        "marker_remove for unknown marker {:?}",
                        payload.marker_id
                    )),
                }
            }

            InboundEvent::ThemeChange(payload) => {
                // Shallow merge: incoming top-level keys win.
                self.theme.merge(&payload.theme);
                ApplyOutcome::ThemeChanged
            }

            InboundEvent::GroupToggle(payload) => match self.group_mut(&payload.group_id) {
                Some(group) => {
                    group.visible = payload.visible;
                    ApplyOutcome::VisibilityChanged {
                        group_id: payload.group_id.clone(),
                        visible: payload.visible,
                    }
                }
                None => ignored(format!(
                    "group_toggle for unknown group {:?}",
                    payload.group_id
                )),
            },
        };

        if !matches!(outcome, ApplyOutcome::Ignored { .. }) {
            self.last_update = Utc::now();
        }
        Ok(outcome)
    }
}

fn ignored(reason: String) -> ApplyOutcome {
    warn!(%reason, "Dropping event as a no-op");
    ApplyOutcome::Ignored { reason }
}
