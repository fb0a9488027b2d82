//! # flymap-render
//!
//! SVG marker rendering for flymap: a small owned element tree, the marker
//! renderer with its id-addressed node table, and theme/stylesheet assembly.
//! Rendering is synchronous; one renderer is owned by one session actor.

pub mod renderer;
pub mod svg;
pub mod theme;

// Re-export commonly used types
pub use renderer::{MarkerHandle, MarkerPatch, MarkerRenderer};
pub use svg::SvgElement;
pub use theme::{default_theme, style_block};
