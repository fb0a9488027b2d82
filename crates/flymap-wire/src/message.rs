//! Wire message types and envelope parsing.
//!
//! Every frame is a JSON object `{"event": <name>, "payload": {...}}`.
//! Parsing is two-stage: the envelope first, then the payload against the
//! schema for its event name, so an unknown event and a malformed payload
//! are distinguishable failures.

use chrono::{DateTime, Utc};
use flymap_core::{MarkerGroup, MarkerSpec, ProtocolError, Theme, Viewport};
use serde::{Deserialize, Serialize};

/// Per-session display configuration carried in `marker_state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SessionConfig {
    pub viewport: Viewport,
    pub update_throttle_ms: u64,
}

/// Payload of `marker_state`: authoritative full-state replace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerStatePayload {
    pub marker_groups: Vec<MarkerGroup>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub config: SessionConfig,
}

/// Payload of `marker_update`: replace one group's marker list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerUpdatePayload {
    pub group_id: String,
    pub markers: Vec<MarkerSpec>,
}

/// Payload of `marker_add`: append one marker to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerAddPayload {
    pub group_id: String,
    pub marker: MarkerSpec,
}

/// Payload of `marker_remove`: drop one marker by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRemovePayload {
    pub group_id: String,
    pub marker_id: String,
}

/// Payload of `theme_change`: shallow-merged into the mirror theme.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeChangePayload {
    pub theme: Theme,
}

/// Payload of `group_toggle`: display-only visibility flip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupTogglePayload {
    pub group_id: String,
    pub visible: bool,
}

/// Events the client consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    MarkerState(MarkerStatePayload),
    MarkerUpdate(MarkerUpdatePayload),
    MarkerAdd(MarkerAddPayload),
    MarkerRemove(MarkerRemovePayload),
    ThemeChange(ThemeChangePayload),
    GroupToggle(GroupTogglePayload),
}

impl InboundEvent {
    /// Wire name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::MarkerState(_) => "marker_state",
            InboundEvent::MarkerUpdate(_) => "marker_update",
            InboundEvent::MarkerAdd(_) => "marker_add",
            InboundEvent::MarkerRemove(_) => "marker_remove",
            InboundEvent::ThemeChange(_) => "theme_change",
            InboundEvent::GroupToggle(_) => "group_toggle",
        }
    }

    /// Parses a frame into an event.
    pub fn from_json(text: &str) -> Result<Self, ProtocolError> {
        let envelope: Envelope =
            serde_json::from_str(text).map_err(|e| ProtocolError::malformed(e.to_string()))?;

        fn payload<T: for<'de> Deserialize<'de>>(
            event: &str,
            value: serde_json::Value,
        ) -> Result<T, ProtocolError> {
            serde_json::from_value(value)
                .map_err(|e| ProtocolError::invalid_payload(event, e.to_string()))
        }

        match envelope.event.as_str() {
            "marker_state" => Ok(Self::MarkerState(payload("marker_state", envelope.payload)?)),
            "marker_update" => Ok(Self::MarkerUpdate(payload(
                "marker_update",
                envelope.payload,
            )?)),
            "marker_add" => Ok(Self::MarkerAdd(payload("marker_add", envelope.payload)?)),
            "marker_remove" => Ok(Self::MarkerRemove(payload(
                "marker_remove",
                envelope.payload,
            )?)),
            "theme_change" => Ok(Self::ThemeChange(payload("theme_change", envelope.payload)?)),
            "group_toggle" => Ok(Self::GroupToggle(payload("group_toggle", envelope.payload)?)),
            other => Err(ProtocolError::UnknownEvent {
                event: other.to_string(),
            }),
        }
    }
}

/// Mirror summary sent with a resync request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientStateSummary {
    pub last_update: DateTime<Utc>,
    pub marker_count: usize,
}

/// Payload of the outbound `state_sync` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSyncPayload {
    pub client_state: ClientStateSummary,
}

/// Events the client produces.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    StateSync(StateSyncPayload),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::StateSync(_) => "state_sync",
        }
    }

    /// Serializes to a wire frame.
    pub fn to_json(&self) -> Result<String, ProtocolError> {
        let payload = match self {
            OutboundEvent::StateSync(p) => serde_json::to_value(p),
        }
        .map_err(|e| ProtocolError::invalid_payload(self.name(), e.to_string()))?;

        serde_json::to_string(&Envelope {
            event: self.name().to_string(),
            payload,
        })
        .map_err(|e| ProtocolError::malformed(e.to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}
