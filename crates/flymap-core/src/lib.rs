//! # flymap-core
//!
//! Shared domain types, error taxonomy and configuration for the flymap
//! workspace: validated geographic points, marker specifications and groups,
//! style/theme values, and the reconnect policy consumed by the sync client.

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{CustomRegion, MapConfig, ReconnectPolicy};
pub use error::{
    ConfigError, ConnectionError, FlymapError, InputError, ProtocolError, Result,
};
pub use types::{
    Animation, CanonicalMarker, GeoPoint, MarkerGroup, MarkerSpec, PixelPoint, Style, Theme,
    Viewport,
};
