//! Region directory: built-in infrastructure regions plus a custom overlay.
//!
//! Codes follow the airport-style convention. Lookup is case-insensitive;
//! custom registrations are consulted as a union with the built-in set and
//! win on conflict, so deployments can override or supplement built-ins
//! without touching this table.

use flymap_core::config::CustomRegion;
use flymap_core::{GeoPoint, InputError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Built-in region table: (code, lat, lng, display name).
const BUILTIN_REGIONS: &[(&str, f64, f64, &str)] = &[
    ("ams", 52.3676, 4.9041, "Amsterdam, Netherlands"),
    ("arn", 59.6519, 17.9186, "Stockholm, Sweden"),
    ("atl", 33.6407, -84.4277, "Atlanta, Georgia (US)"),
    ("bog", 4.7110, -74.0721, "Bogotá, Colombia"),
    ("bom", 19.0760, 72.8777, "Mumbai, India"),
    ("bos", 42.3601, -71.0589, "Boston, Massachusetts (US)"),
    ("cdg", 48.8566, 2.3522, "Paris, France"),
    ("den", 39.7392, -104.9903, "Denver, Colorado (US)"),
    ("dfw", 32.7767, -96.7970, "Dallas, Texas (US)"),
    ("ewr", 40.7357, -74.1724, "Secaucus, New Jersey (US)"),
    ("eze", -34.8222, -58.5358, "Ezeiza, Argentina"),
    ("fra", 50.1109, 8.6821, "Frankfurt, Germany"),
    ("gdl", 20.6597, -103.3496, "Guadalajara, Mexico"),
    ("gig", -22.9068, -43.1729, "Rio de Janeiro, Brazil"),
    ("gru", -23.5505, -46.6333, "São Paulo, Brazil"),
    ("hkg", 22.3193, 114.1694, "Hong Kong"),
    ("iad", 38.9531, -77.4565, "Ashburn, Virginia (US)"),
    ("jnb", -26.2041, 28.0473, "Johannesburg, South Africa"),
    ("lax", 34.0522, -118.2437, "Los Angeles, California (US)"),
    ("lhr", 51.5074, -0.1278, "London, United Kingdom"),
    ("mad", 40.4168, -3.7038, "Madrid, Spain"),
    ("mia", 25.7617, -80.1918, "Miami, Florida (US)"),
    ("nrt", 35.6762, 139.6503, "Tokyo, Japan"),
    ("ord", 41.8781, -87.6298, "Chicago, Illinois (US)"),
    ("otp", 44.4268, 26.1025, "Bucharest, Romania"),
    ("phx", 33.4484, -112.0740, "Phoenix, Arizona (US)"),
    ("qro", 20.5888, -100.3899, "Querétaro, Mexico"),
    ("scl", -33.4489, -70.6693, "Santiago, Chile"),
    ("sea", 47.6062, -122.3321, "Seattle, Washington (US)"),
    ("sin", 1.3521, 103.8198, "Singapore"),
    ("sjc", 37.3382, -121.8863, "San Jose, California (US)"),
    ("syd", -33.8688, 151.2093, "Sydney, Australia"),
    ("waw", 52.2297, 21.0122, "Warsaw, Poland"),
    ("yul", 45.5017, -73.5673, "Montreal, Canada"),
    ("yyz", 43.6532, -79.3832, "Toronto, Canada"),
];

/// A resolved region: code, validated position, display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub code: String,
    pub point: GeoPoint,
    pub name: String,
}

/// Case-insensitive directory of region codes.
///
/// Built once at configuration time; read-only afterwards. The custom table
/// is injected explicitly rather than read from global state so tests can
/// supply fixture tables.
#[derive(Debug, Clone, Default)]
pub struct RegionDirectory {
    entries: BTreeMap<String, RegionEntry>,
}

impl RegionDirectory {
    /// Builds a directory containing only the built-in regions.
    pub fn builtin() -> Result<Self, InputError> {
        Self::with_custom(&BTreeMap::new())
    }

    /// Builds a directory from the built-ins plus a custom overlay.
    ///
    /// Custom entries replace built-ins sharing the same code. Invalid
    /// custom coordinates are rejected here rather than at lookup time.
    pub fn with_custom(custom: &BTreeMap<String, CustomRegion>) -> Result<Self, InputError> {
        let mut entries = BTreeMap::new();

        for &(code, lat, lng, name) in BUILTIN_REGIONS {
            entries.insert(
                code.to_string(),
                RegionEntry {
                    code: code.to_string(),
                    point: GeoPoint::new(lat, lng)?,
                    name: name.to_string(),
                },
            );
        }

        for (code, region) in custom {
            let folded = code.to_lowercase();
            let (lat, lng) = region.coordinates;
            entries.insert(
                folded.clone(),
                RegionEntry {
                    code: folded,
                    point: GeoPoint::new(lat, lng)?,
                    name: region.name.clone(),
                },
            );
        }

        Ok(Self { entries })
    }

    /// Resolves a region code. Unknown codes are a defined outcome, not an
    /// error; the caller decides whether that is fatal.
    pub fn lookup(&self, code: &str) -> Option<&RegionEntry> {
        self.entries.get(&code.to_lowercase())
    }

    /// Display name for a code, if known.
    pub fn name(&self, code: &str) -> Option<&str> {
        self.lookup(code).map(|e| e.name.as_str())
    }

    /// Whether a code resolves.
    pub fn is_valid(&self, code: &str) -> bool {
        self.lookup(code).is_some()
    }

    /// Number of known regions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in code order.
    pub fn iter(&self) -> impl Iterator<Item = &RegionEntry> {
        self.entries.values()
    }
}
