//! # flymap-wire
//!
//! Wire protocol for live map sessions: the JSON event envelope, typed
//! payloads for every inbound and outbound event, and structural validation
//! run before any event is applied to mirror state.

pub mod message;
pub mod validate;

// Re-export commonly used types
pub use message::{
    ClientStateSummary, GroupTogglePayload, InboundEvent, MarkerAddPayload, MarkerRemovePayload,
    MarkerStatePayload, MarkerUpdatePayload, OutboundEvent, SessionConfig, StateSyncPayload,
    ThemeChangePayload,
};
pub use validate::{validate_add, validate_state, validate_update};
