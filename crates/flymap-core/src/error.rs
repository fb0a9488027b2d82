//! Error types for the flymap marker pipeline.
//!
//! The taxonomy follows the failure domains of the system: bad input markers,
//! malformed wire payloads, and connection-level failures. Every error here is
//! recoverable somewhere — nothing in this workspace is allowed to take down
//! the host process.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using FlymapError as the error type.
pub type Result<T> = std::result::Result<T, FlymapError>;

/// Top-level error type for all flymap operations.
#[derive(Debug, Error, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum FlymapError {
    /// Malformed marker specifications and unknown regions
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Malformed inbound wire events
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection lifecycle failures
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors in user-supplied marker specifications.
///
/// Always recoverable: the render path skips the offending marker and logs,
/// the authoring-validation path aborts the build step. The rules are shared;
/// only the failure policy differs between call sites.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum InputError {
    /// Latitude outside [-90, 90]
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180]
    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    /// Region code not present in the built-in or custom tables
    #[error("Unknown region code: {code:?}")]
    UnknownRegion { code: String },

    /// Object spec missing a required field
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    /// Input that matches none of the supported marker shapes
    #[error("Unsupported marker shape: {details}")]
    UnsupportedShape { details: String },

    /// Style size must be positive
    #[error("Invalid marker size: {0} (must be positive)")]
    InvalidSize(f64),
}

impl InputError {
    /// Creates an unknown region error.
    pub fn unknown_region(code: impl Into<String>) -> Self {
        Self::UnknownRegion { code: code.into() }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }
}

/// Errors in inbound wire events.
///
/// A protocol error drops the offending event and leaves the mirror state
/// untouched; it never results in a partially-applied event.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ProtocolError {
    /// Frame was not a valid event envelope
    #[error("Malformed event envelope: {reason}")]
    MalformedEnvelope { reason: String },

    /// Envelope named an event this client does not understand
    #[error("Unknown event: {event:?}")]
    UnknownEvent { event: String },

    /// Payload did not match the schema for its event
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: String, reason: String },

    /// A group in the payload is missing its id
    #[error("Group at position {index} has no id")]
    MissingGroupId { index: usize },

    /// A marker in the payload failed normalization
    #[error("Invalid marker {index} in group {group_id:?}: {source}")]
    InvalidMarker {
        group_id: String,
        index: usize,
        source: InputError,
    },
}

impl ProtocolError {
    /// Creates a malformed envelope error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            reason: reason.into(),
        }
    }

    /// Creates an invalid payload error.
    pub fn invalid_payload(event: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            event: event.into(),
            reason: reason.into(),
        }
    }
}

/// Errors in the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum ConnectionError {
    /// Channel join was rejected or timed out
    #[error("Failed to join {topic:?}: {reason}")]
    JoinFailed { topic: String, reason: String },

    /// Transport-level failure while joined
    #[error("Transport error: {reason}")]
    Transport { reason: String },

    /// Remote closed the connection unexpectedly
    #[error("Connection closed: {reason}")]
    Closed { reason: String },

    /// Reconnect budget spent; session degrades to fallback
    #[error("Maximum reconnection attempts ({max_attempts}) reached")]
    AttemptsExhausted { max_attempts: u32 },
}

impl ConnectionError {
    /// Creates a join failed error.
    pub fn join_failed(topic: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::JoinFailed {
            topic: topic.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Creates a closed error.
    pub fn closed(reason: impl Into<String>) -> Self {
        Self::Closed {
            reason: reason.into(),
        }
    }

    /// Returns true if this error is transient and reconnecting may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectionError::JoinFailed { .. }
                | ConnectionError::Transport { .. }
                | ConnectionError::Closed { .. }
        )
    }

    /// Returns true if this error is permanent and retrying won't help.
    pub fn is_permanent(&self) -> bool {
        matches!(self, ConnectionError::AttemptsExhausted { .. })
    }
}

/// Errors related to configuration loading and validation.
#[derive(Debug, Error, Serialize, Deserialize)]
pub enum ConfigError {
    /// Failed to read the configuration file
    #[error("Failed to load configuration from {path}: {reason}")]
    LoadFailed { path: String, reason: String },

    /// Configuration did not parse
    #[error("Invalid configuration format: {reason}")]
    InvalidFormat { reason: String },

    /// A field held an out-of-range or nonsensical value
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// Two custom regions share a code after case folding
    #[error("Duplicate custom region code: {code:?}")]
    DuplicateRegion { code: String },
}

impl ConfigError {
    /// Creates a load failed error.
    pub fn load_failed(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::LoadFailed {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_error_transient() {
        let err = ConnectionError::transport("reset by peer");
        assert!(err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn test_connection_error_permanent() {
        let err = ConnectionError::AttemptsExhausted { max_attempts: 5 };
        assert!(!err.is_transient());
        assert!(err.is_permanent());
    }

    #[test]
    fn test_error_serialization() {
        let err = FlymapError::Input(InputError::unknown_region("xyz-invalid"));
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("Input"));
        assert!(json.contains("xyz-invalid"));
    }

    #[test]
    fn test_input_error_helpers() {
        let err = InputError::missing_field("coordinates");
        assert!(matches!(err, InputError::MissingField { .. }));
        assert!(err.to_string().contains("coordinates"));
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::invalid_payload("marker_update", "markers is not an array");
        assert!(err.to_string().contains("marker_update"));
    }
}
