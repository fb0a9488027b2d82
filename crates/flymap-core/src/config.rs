//! Configuration for flymap map instances.
//!
//! Supports loading from YAML files, environment variable overrides through
//! the `config` crate (`FLYMAP__` prefix), and validation of all settings
//! before a map is constructed. Custom regions and theme defaults live here
//! so nothing downstream has to consult ambient global state.

use crate::error::{ConfigError, Result};
use crate::types::{GeoPoint, Theme, Viewport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// A user-registered region, keyed by its code in [`MapConfig::custom_regions`].
///
/// Custom regions are consulted as an overlay on the built-in table and win
/// on code conflicts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRegion {
    /// Display name
    pub name: String,
    /// (lat, lng) in decimal degrees
    pub coordinates: (f64, f64),
}

/// Reconnection policy for the sync client.
///
/// Delay for attempt `n` (1-based) is `min(base * 2^(n-1), cap)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconnectPolicy {
    /// Base backoff delay in milliseconds
    pub base_delay_ms: u64,
    /// Backoff cap in milliseconds
    pub max_delay_ms: u64,
    /// Attempts before the session degrades to fallback
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            max_attempts: 5,
        }
    }
}

/// Root configuration for a map instance.
///
/// # Examples
///
/// ```no_run
/// use flymap_core::config::MapConfig;
///
/// let config = MapConfig::from_file("flymap.yaml").unwrap();
/// config.validate().unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MapConfig {
    /// Projection target
    pub viewport: Viewport,

    /// Default theme custom properties
    pub theme: Theme,

    /// User-registered regions, code -> entry
    pub custom_regions: BTreeMap<String, CustomRegion>,

    /// Reconnection policy for live sessions
    pub reconnect: ReconnectPolicy,

    /// Minimum interval between renders driven by wire events
    pub update_throttle_ms: u64,
}

impl MapConfig {
    /// Loads configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::load_failed(path.display().to_string(), e.to_string())
        })?;
        Self::from_yaml(&contents)
    }

    /// Loads configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Loads configuration through the `config` crate, layering the file
    /// with `FLYMAP__`-prefixed environment variables.
    pub fn from_config_builder<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let config = config::Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(
                config::Environment::with_prefix("FLYMAP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::load_failed(path.display().to_string(), e.to_string()))?;

        config.try_deserialize().map_err(|e| {
            ConfigError::InvalidFormat {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Validates all settings. Call before constructing a map.
    pub fn validate(&self) -> Result<()> {
        if self.viewport.width() <= 0.0 || self.viewport.height() <= 0.0 {
            return Err(ConfigError::invalid_value(
                "viewport",
                format!(
                    "degenerate bounds {}x{}",
                    self.viewport.width(),
                    self.viewport.height()
                ),
            )
            .into());
        }

        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "reconnect.max_attempts",
                "must be at least 1",
            )
            .into());
        }
        if self.reconnect.base_delay_ms == 0 {
            return Err(ConfigError::invalid_value(
                "reconnect.base_delay_ms",
                "must be positive",
            )
            .into());
        }
        if self.reconnect.max_delay_ms < self.reconnect.base_delay_ms {
            return Err(ConfigError::invalid_value(
                "reconnect.max_delay_ms",
                "must not be below base_delay_ms",
            )
            .into());
        }

        let mut seen = BTreeMap::new();
        for (code, region) in &self.custom_regions {
            let folded = code.to_lowercase();
            if let Some(prev) = seen.insert(folded, code) {
                return Err(ConfigError::DuplicateRegion {
                    code: format!("{prev} / {code}"),
                }
                .into());
            }
            let (lat, lng) = region.coordinates;
            GeoPoint::new(lat, lng).map_err(|e| {
                ConfigError::invalid_value(format!("custom_regions.{code}"), e.to_string())
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = MapConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reconnect.max_attempts, 5);
    }

    #[test]
    fn test_from_yaml() {
        let yaml = r#"
viewport:
  max_x: 1024
  max_y: 500
custom_regions:
  hq:
    name: "Head Office"
    coordinates: [52.52, 13.40]
reconnect:
  base_delay_ms: 500
  max_attempts: 3
"#;
        let config = MapConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.viewport.max_x, 1024.0);
        assert_eq!(config.custom_regions["hq"].name, "Head Office");
        assert_eq!(config.reconnect.base_delay_ms, 500);
        // Unspecified fields keep defaults.
        assert_eq!(config.reconnect.max_delay_ms, 10_000);
        config.validate().unwrap();
    }

    #[test]
    fn test_invalid_custom_region_rejected() {
        let mut config = MapConfig::default();
        config.custom_regions.insert(
            "bad".to_string(),
            CustomRegion {
                name: "Nowhere".to_string(),
                coordinates: (200.0, 0.0),
            },
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duplicate_code_after_case_folding() {
        let mut config = MapConfig::default();
        let region = CustomRegion {
            name: "X".to_string(),
            coordinates: (0.0, 0.0),
        };
        config.custom_regions.insert("hq".to_string(), region.clone());
        config.custom_regions.insert("HQ".to_string(), region);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_degenerate_viewport_rejected() {
        let mut config = MapConfig::default();
        config.viewport.max_x = config.viewport.min_x;
        assert!(config.validate().is_err());
    }
}
