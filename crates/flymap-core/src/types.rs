//! Core domain types shared by every flymap crate.
//!
//! The map pipeline moves through three representations: a raw [`MarkerSpec`]
//! as authored or received off the wire, a validated [`GeoPoint`], and a
//! [`CanonicalMarker`] the renderer can address by id.

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A validated WGS84 position.
///
/// Constructed only through [`GeoPoint::new`], so any `GeoPoint` held by
/// downstream code is already range-checked.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    /// Latitude in decimal degrees (-90 to 90)
    lat: f64,
    /// Longitude in decimal degrees (-180 to 180)
    lng: f64,
}

impl GeoPoint {
    /// Creates a point, rejecting out-of-range coordinates.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InputError> {
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InputError::InvalidLatitude(lat));
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(InputError::InvalidLongitude(lng));
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

/// Pixel bounding box the projection maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Viewport {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        // Matches the aspect ratio of the bundled world outline.
        Self {
            min_x: 0.0,
            min_y: 0.0,
            max_x: 800.0,
            max_y: 391.0,
        }
    }
}

impl Viewport {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Projected 2D position inside a [`Viewport`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

/// Marker animation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Animation {
    #[default]
    None,
    /// Size oscillates between base and base + delta, finite repeats.
    Pulse,
    /// Opacity oscillates between min and max, indefinitely.
    Fade,
}

/// Visual style for a marker or group, with per-field defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// CSS colour value
    pub colour: String,
    /// Marker radius in pixels (must be positive)
    pub size: f64,
    pub animation: Animation,
    pub glow: bool,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            colour: "#24b0a4".to_string(),
            size: 5.0,
            animation: Animation::None,
            glow: false,
        }
    }
}

impl Style {
    /// Validates field constraints not expressible in the type.
    pub fn validate(&self) -> Result<(), InputError> {
        if self.size <= 0.0 {
            return Err(InputError::InvalidSize(self.size));
        }
        if self.colour.is_empty() {
            return Err(InputError::MissingField {
                field: "colour".to_string(),
            });
        }
        Ok(())
    }
}

/// Theme as a flat map of CSS custom-property names to values.
///
/// Theme changes arriving over the wire are merged shallowly: each top-level
/// key in the incoming payload replaces the existing value wholesale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct Theme(pub BTreeMap<String, String>);

impl Theme {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Shallow merge: keys in `other` win.
    pub fn merge(&mut self, other: &Theme) {
        for (k, v) in &other.0 {
            self.0.insert(k.clone(), v.clone());
        }
    }
}

/// A marker as authored or received, before normalization.
///
/// The untagged representation accepts the three wire shapes directly:
/// `"sjc"`, `[37.77, -122.41]`, or `{"label": "...", "coordinates": [...]}`.
/// Anything else is rejected at deserialization with an
/// [`InputError::UnsupportedShape`] message naming the accepted shapes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MarkerSpec {
    RegionCode(String),
    Coordinate(f64, f64),
    LabeledCoordinate {
        label: String,
        coordinates: (f64, f64),
    },
}

impl<'de> Deserialize<'de> for MarkerSpec {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            RegionCode(String),
            Coordinate(f64, f64),
            LabeledCoordinate {
                label: String,
                coordinates: (f64, f64),
            },
        }

        match Repr::deserialize(deserializer) {
            Ok(Repr::RegionCode(code)) => Ok(MarkerSpec::RegionCode(code)),
            Ok(Repr::Coordinate(lat, lng)) => Ok(MarkerSpec::Coordinate(lat, lng)),
            Ok(Repr::LabeledCoordinate { label, coordinates }) => {
                Ok(MarkerSpec::LabeledCoordinate { label, coordinates })
            }
            // The untagged derive reports "no variant matched", which tells
            // an author nothing. Name the shapes we accept instead.
            Err(_) => Err(serde::de::Error::custom(InputError::UnsupportedShape {
                details: "expected a region code string, a [lat, lng] pair, \
                          or a {label, coordinates} object"
                    .to_string(),
            })),
        }
    }
}

impl MarkerSpec {
    /// Label carried by the spec itself, if any.
    pub fn label(&self) -> Option<&str> {
        match self {
            MarkerSpec::LabeledCoordinate { label, .. } => Some(label),
            _ => None,
        }
    }

    /// Short description of the shape, for diagnostics.
    pub fn shape_name(&self) -> &'static str {
        match self {
            MarkerSpec::RegionCode(_) => "region code",
            MarkerSpec::Coordinate(..) => "coordinate pair",
            MarkerSpec::LabeledCoordinate { .. } => "labeled coordinate",
        }
    }
}

/// A fully resolved marker the renderer can address.
///
/// `id` is stable for a given logical marker across updates; the wire format
/// derives it as `"<group id>-<index>"`, and indices are re-derived from list
/// position after every structural mutation so mirror and renderer agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalMarker {
    pub id: String,
    pub point: GeoPoint,
    pub label: Option<String>,
    pub style_key: Option<String>,
    pub style_override: Option<Style>,
}

impl CanonicalMarker {
    /// Derives the wire-compatible marker id for a group member.
    pub fn derive_id(group_id: &str, index: usize) -> String {
        format!("{group_id}-{index}")
    }
}

/// A named, styled collection of markers toggled together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerGroup {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub markers: Vec<MarkerSpec>,
    #[serde(default)]
    pub style: Style,
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_visible() -> bool {
    true
}

impl MarkerGroup {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            markers: Vec::new(),
            style: Style::default(),
            visible: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_range_check() {
        assert!(GeoPoint::new(37.77, -122.41).is_ok());
        assert!(matches!(
            GeoPoint::new(200.0, 0.0),
            Err(InputError::InvalidLatitude(_))
        ));
        assert!(matches!(
            GeoPoint::new(0.0, -181.0),
            Err(InputError::InvalidLongitude(_))
        ));
    }

    #[test]
    fn test_viewport_default() {
        let vp = Viewport::default();
        assert_eq!(vp.width(), 800.0);
        assert_eq!(vp.height(), 391.0);
    }

    #[test]
    fn test_marker_spec_untagged_shapes() {
        let code: MarkerSpec = serde_json::from_str("\"sjc\"").unwrap();
        assert_eq!(code, MarkerSpec::RegionCode("sjc".to_string()));

        let pair: MarkerSpec = serde_json::from_str("[37.77, -122.41]").unwrap();
        assert_eq!(pair, MarkerSpec::Coordinate(37.77, -122.41));

        let labeled: MarkerSpec =
            serde_json::from_str(r#"{"label": "HQ", "coordinates": [51.5, -0.12]}"#).unwrap();
        assert_eq!(labeled.label(), Some("HQ"));
    }

    #[test]
    fn test_unsupported_shape_named_in_error() {
        let err = serde_json::from_str::<MarkerSpec>("42").unwrap_err();
        assert!(
            err.to_string().contains("Unsupported marker shape"),
            "error was: {err}"
        );
        let err = serde_json::from_str::<MarkerSpec>(r#"{"label": "no coords"}"#).unwrap_err();
        assert!(err.to_string().contains("region code string"));
    }

    #[test]
    fn test_style_defaults_and_validation() {
        let style: Style = serde_json::from_str(r#"{"glow": true}"#).unwrap();
        assert!(style.glow);
        assert_eq!(style.animation, Animation::None);
        assert!(style.validate().is_ok());

        let bad = Style {
            size: 0.0,
            ..Style::default()
        };
        assert!(matches!(bad.validate(), Err(InputError::InvalidSize(_))));
    }

    #[test]
    fn test_theme_shallow_merge() {
        let mut theme = Theme(BTreeMap::from([
            ("--marker-colour".to_string(), "#fff".to_string()),
            ("--map-bg".to_string(), "#000".to_string()),
        ]));
        let incoming = Theme(BTreeMap::from([(
            "--marker-colour".to_string(),
            "#0f0".to_string(),
        )]));
        theme.merge(&incoming);
        assert_eq!(theme.get("--marker-colour"), Some("#0f0"));
        assert_eq!(theme.get("--map-bg"), Some("#000"));
    }

    #[test]
    fn test_marker_id_derivation() {
        assert_eq!(CanonicalMarker::derive_id("prod", 2), "prod-2");
    }
}
