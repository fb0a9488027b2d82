//! # flymap-geo
//!
//! Geographic primitives for the flymap workspace: the equirectangular
//! projection, the region directory with its custom overlay, and marker
//! normalization. Everything here is pure and synchronous; the directory is
//! built once from configuration and read-only afterwards.

pub mod normalize;
pub mod projection;
pub mod regions;

// Re-export commonly used items
pub use normalize::{canonicalize, canonicalize_group, normalize};
pub use projection::project;
pub use regions::{RegionDirectory, RegionEntry};
