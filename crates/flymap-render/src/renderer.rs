//! Marker renderer: owns the visual tree for one map instance.
//!
//! All operations are synchronous and idempotent with respect to the final
//! rendered output. The renderer keeps an id -> node table (the analogue of
//! the live element registry a browser hook would hold) and serializes the
//! whole document on demand.

use crate::svg::{fmt_num, SvgElement};
use crate::theme;
use flymap_core::{Animation, MarkerGroup, Style, Theme, Viewport};
use flymap_geo::{canonicalize_group, project, RegionDirectory};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Pulse grows the dot by this many pixels at peak.
const PULSE_DELTA: f64 = 3.0;
const PULSE_DURATION: &str = "1.5s";
const PULSE_REPEATS: &str = "3";

/// Fade oscillates opacity between these bounds, indefinitely.
const FADE_MIN: f64 = 0.4;
const FADE_MAX: f64 = 1.0;
const FADE_DURATION: &str = "2s";

/// Glow halo radius as a multiple of the dot radius.
const GLOW_RADIUS_FACTOR: f64 = 2.5;

/// Reference to a rendered marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerHandle {
    pub id: String,
    pub group_id: String,
}

/// Partial update for [`MarkerRenderer::update_marker`].
#[derive(Debug, Clone, Default)]
pub struct MarkerPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub style: Option<Style>,
}

#[derive(Debug, Clone)]
struct MarkerNode {
    group_id: String,
    element: SvgElement,
    style: Style,
    x: f64,
    y: f64,
}

#[derive(Debug, Clone)]
struct GroupNode {
    id: String,
    visible: bool,
    marker_ids: Vec<String>,
}

/// Renderer for one map instance.
///
/// Owned exclusively by its session actor; multiple maps on one page get
/// independent renderers with separate id namespaces.
#[derive(Debug)]
pub struct MarkerRenderer {
    viewport: Viewport,
    theme: Theme,
    gradients: BTreeMap<String, SvgElement>,
    groups: Vec<GroupNode>,
    markers: BTreeMap<String, MarkerNode>,
}

impl MarkerRenderer {
    pub fn new(viewport: Viewport, theme: Theme) -> Self {
        Self {
            viewport,
            theme,
            gradients: BTreeMap::new(),
            groups: Vec::new(),
            markers: BTreeMap::new(),
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Replaces the theme wholesale. A pure style update: marker geometry is
    /// untouched and picks the new values up at the next serialization.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Number of rendered markers across all groups.
    pub fn marker_count(&self) -> usize {
        self.markers.len()
    }

    pub fn has_marker(&self, id: &str) -> bool {
        self.markers.contains_key(id)
    }

    /// Builds a visual marker at the given pixel position.
    ///
    /// Replaces any existing marker with the same id. If the style has glow
    /// set, a gradient resource keyed by marker id is provisioned exactly
    /// once and referenced from the halo.
    pub fn create_marker(
        &mut self,
        id: &str,
        group_id: &str,
        style: &Style,
        x: f64,
        y: f64,
        extra_attrs: &[(String, String)],
    ) -> MarkerHandle {
        if self.markers.contains_key(id) {
            self.remove_marker(id);
        }

        self.ensure_group(group_id, true);

        if style.glow {
            self.ensure_gradient(id, &style.colour);
        }

        let element = build_marker_element(id, style, x, y, extra_attrs);
        self.markers.insert(
            id.to_string(),
            MarkerNode {
                group_id: group_id.to_string(),
                element,
                style: style.clone(),
                x,
                y,
            },
        );
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == group_id) {
            group.marker_ids.push(id.to_string());
        }

        MarkerHandle {
            id: id.to_string(),
            group_id: group_id.to_string(),
        }
    }

    /// Mutates a marker in place. Returns false (a no-op, not an error) if
    /// the id is unknown.
    ///
    /// Position and colour updates never recreate the element. A size-only
    /// change while the animation kind is unchanged refreshes the animation
    /// values in place, preserving continuity; an animation kind change
    /// removes the old animation before adding the new one.
    pub fn update_marker(&mut self, id: &str, patch: &MarkerPatch) -> bool {
        let Some(node) = self.markers.get_mut(id) else {
            return false;
        };

        if let Some(x) = patch.x {
            node.x = x;
        }
        if let Some(y) = patch.y {
            node.y = y;
        }
        set_position(&mut node.element, node.x, node.y);

        if let Some(style) = &patch.style {
            let old = node.style.clone();
            apply_style(&mut node.element, id, &old, style);
            node.style = style.clone();

            if style.glow && !old.glow {
                let colour = style.colour.clone();
                self.ensure_gradient(id, &colour);
            } else if !style.glow && old.glow {
                self.gradients.remove(&gradient_id(id));
            } else if style.glow && style.colour != old.colour {
                self.gradients.remove(&gradient_id(id));
                let colour = style.colour.clone();
                self.ensure_gradient(id, &colour);
            }
        }

        true
    }

    /// Deletes a marker and its glow resource. Returns false if unknown.
    pub fn remove_marker(&mut self, id: &str) -> bool {
        let Some(node) = self.markers.remove(id) else {
            return false;
        };
        self.gradients.remove(&gradient_id(id));
        if let Some(group) = self.groups.iter_mut().find(|g| g.id == node.group_id) {
            group.marker_ids.retain(|m| m != id);
        }
        true
    }

    /// Batch creation from groups: normalize and project every marker,
    /// skipping (with a log) any that fail rather than aborting the batch.
    /// Partial rendering beats total failure.
    pub fn create_markers_from_groups(
        &mut self,
        groups: &[MarkerGroup],
        viewport: &Viewport,
        directory: &RegionDirectory,
    ) -> Vec<MarkerHandle> {
        self.viewport = *viewport;
        let mut handles = Vec::new();

        for group in groups {
            self.ensure_group(&group.id, group.visible);
            for (index, result) in canonicalize_group(group, directory) {
                match result {
                    Ok(marker) => {
                        let pixel = project(marker.point, viewport);
                        let style = marker.style_override.as_ref().unwrap_or(&group.style);
                        let extra = marker
                            .label
                            .as_ref()
                            .map(|l| vec![("data-label".to_string(), l.clone())])
                            .unwrap_or_default();
                        handles.push(self.create_marker(
                            &marker.id, &group.id, style, pixel.x, pixel.y, &extra,
                        ));
                    }
                    Err(e) => {
                        warn!(
                            group_id = %group.id,
                            index,
                            shape = group.markers[index].shape_name(),
                            error = %e,
                            "Skipping marker that failed normalization"
                        );
                    }
                }
            }
        }

        debug!(rendered = handles.len(), "Batch marker creation complete");
        handles
    }

    /// Removes every marker belonging to a group, keeping the group node.
    /// Used for incremental group replacement.
    pub fn remove_group_markers(&mut self, group_id: &str) -> usize {
        let ids: Vec<String> = self
            .groups
            .iter()
            .find(|g| g.id == group_id)
            .map(|g| g.marker_ids.clone())
            .unwrap_or_default();
        for id in &ids {
            self.remove_marker(id);
        }
        ids.len()
    }

    /// Removes a group and everything it owns.
    pub fn remove_group(&mut self, group_id: &str) -> bool {
        if !self.groups.iter().any(|g| g.id == group_id) {
            return false;
        }
        self.remove_group_markers(group_id);
        self.groups.retain(|g| g.id != group_id);
        true
    }

    /// Display-only visibility rule scoped to the group: a class flip at
    /// serialization time, reversible without destroying markers. Returns
    /// false if the group is unknown.
    pub fn toggle_group_visibility(&mut self, group_id: &str, visible: bool) -> bool {
        match self.groups.iter_mut().find(|g| g.id == group_id) {
            Some(group) => {
                group.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Drops all rendered content. Used when degrading to fallback and on
    /// full-state replace.
    pub fn clear(&mut self) {
        self.gradients.clear();
        self.groups.clear();
        self.markers.clear();
    }

    /// Serializes the current document.
    pub fn to_svg(&self) -> String {
        let mut root = SvgElement::new("svg")
            .attr("xmlns", "http://www.w3.org/2000/svg")
            .attr("class", "flymap")
            .attr(
                "viewBox",
                format!(
                    "{} {} {} {}",
                    fmt_num(self.viewport.min_x),
                    fmt_num(self.viewport.min_y),
                    fmt_num(self.viewport.width()),
                    fmt_num(self.viewport.height())
                ),
            );

        root.push_child(SvgElement::new("style").text(theme::style_block(&self.theme)));

        if !self.gradients.is_empty() {
            let mut defs = SvgElement::new("defs");
            for gradient in self.gradients.values() {
                defs.push_child(gradient.clone());
            }
            root.push_child(defs);
        }

        root.push_child(
            SvgElement::new("rect")
                .attr("class", "map-bg")
                .attr("x", fmt_num(self.viewport.min_x))
                .attr("y", fmt_num(self.viewport.min_y))
                .attr("width", fmt_num(self.viewport.width()))
                .attr("height", fmt_num(self.viewport.height()))
                .attr("fill", "var(--map-bg)"),
        );

        for group in &self.groups {
            let class = if group.visible {
                "marker-group".to_string()
            } else {
                "marker-group hidden".to_string()
            };
            let mut g = SvgElement::new("g")
                .attr("class", class)
                .attr("data-group-id", group.id.clone());
            for marker_id in &group.marker_ids {
                if let Some(node) = self.markers.get(marker_id) {
                    g.push_child(node.element.clone());
                }
            }
            root.push_child(g);
        }

        root.render()
    }

    fn ensure_group(&mut self, group_id: &str, visible: bool) {
        if !self.groups.iter().any(|g| g.id == group_id) {
            self.groups.push(GroupNode {
                id: group_id.to_string(),
                visible,
                marker_ids: Vec::new(),
            });
        }
    }

    fn ensure_gradient(&mut self, marker_id: &str, colour: &str) {
        let key = gradient_id(marker_id);
        // Created once, referenced by id; never duplicated.
        self.gradients
            .entry(key.clone())
            .or_insert_with(|| build_gradient(&key, colour));
    }
}

fn gradient_id(marker_id: &str) -> String {
    format!("glow-{marker_id}")
}

fn build_gradient(gradient_id: &str, colour: &str) -> SvgElement {
    SvgElement::new("radialGradient")
        .attr("id", gradient_id)
        .child(
            SvgElement::new("stop")
                .attr("offset", "0%")
                .attr("stop-color", colour)
                .attr("stop-opacity", "0.6"),
        )
        .child(
            SvgElement::new("stop")
                .attr("offset", "100%")
                .attr("stop-color", colour)
                .attr("stop-opacity", "0"),
        )
}

fn build_marker_element(
    id: &str,
    style: &Style,
    x: f64,
    y: f64,
    extra_attrs: &[(String, String)],
) -> SvgElement {
    let mut root = SvgElement::new("g").attr("class", "marker").attr("id", id);
    for (key, value) in extra_attrs {
        root.set_attr(key.clone(), value.clone());
    }

    if style.glow {
        root.push_child(
            SvgElement::new("circle")
                .attr("class", "marker-glow")
                .attr("cx", fmt_num(x))
                .attr("cy", fmt_num(y))
                .attr("r", fmt_num(style.size * GLOW_RADIUS_FACTOR))
                .attr("fill", format!("url(#{})", gradient_id(id))),
        );
    }

    let mut dot = SvgElement::new("circle")
        .attr("class", "marker-dot")
        .attr("cx", fmt_num(x))
        .attr("cy", fmt_num(y))
        .attr("r", fmt_num(style.size))
        .attr("fill", style.colour.clone());
    if let Some(animate) = build_animation(style) {
        dot.push_child(animate);
    }
    root.push_child(dot);

    root
}

/// Animation element for a style, if any.
///
/// Pulse oscillates the radius between base and base + delta over a fixed
/// duration with a finite repeat count; fade oscillates opacity between the
/// configured bounds indefinitely.
fn build_animation(style: &Style) -> Option<SvgElement> {
    match style.animation {
        Animation::None => None,
        Animation::Pulse => Some(
            SvgElement::new("animate")
                .attr("attributeName", "r")
                .attr("values", pulse_values(style.size))
                .attr("dur", PULSE_DURATION)
                .attr("repeatCount", PULSE_REPEATS),
        ),
        Animation::Fade => Some(
            SvgElement::new("animate")
                .attr("attributeName", "opacity")
                .attr(
                    "values",
                    format!("{FADE_MAX};{FADE_MIN};{FADE_MAX}"),
                )
                .attr("dur", FADE_DURATION)
                .attr("repeatCount", "indefinite"),
        ),
    }
}

fn pulse_values(size: f64) -> String {
    format!(
        "{};{};{}",
        fmt_num(size),
        fmt_num(size + PULSE_DELTA),
        fmt_num(size)
    )
}

fn set_position(element: &mut SvgElement, x: f64, y: f64) {
    for child in element.children_mut() {
        if child.tag() == "circle" {
            child.set_attr("cx", fmt_num(x));
            child.set_attr("cy", fmt_num(y));
        }
    }
}

fn apply_style(element: &mut SvgElement, id: &str, old: &Style, new: &Style) {
    // Halo first: add, drop, or resize.
    if new.glow && !old.glow {
        let (x, y) = dot_position(element);
        let halo = SvgElement::new("circle")
            .attr("class", "marker-glow")
            .attr("cx", fmt_num(x))
            .attr("cy", fmt_num(y))
            .attr("r", fmt_num(new.size * GLOW_RADIUS_FACTOR))
            .attr("fill", format!("url(#{})", gradient_id(id)));
        element.children_mut().insert(0, halo);
    } else if !new.glow && old.glow {
        element
            .children_mut()
            .retain(|c| c.get_attr("class") != Some("marker-glow"));
    }

    for child in element.children_mut() {
        match child.get_attr("class") {
            Some("marker-glow") => {
                child.set_attr("r", fmt_num(new.size * GLOW_RADIUS_FACTOR));
            }
            Some("marker-dot") => {
                child.set_attr("fill", new.colour.clone());
                child.set_attr("r", fmt_num(new.size));

                if new.animation != old.animation {
                    // Stale animations must never layer under the new one.
                    child.remove_children("animate");
                    if let Some(animate) = build_animation(new) {
                        child.push_child(animate);
                    }
                } else if new.animation == Animation::Pulse && new.size != old.size {
                    // Same kind, new size: refresh values in place so the
                    // running animation keeps its phase.
                    if let Some(animate) = child.find_child_mut("animate") {
                        animate.set_attr("values", pulse_values(new.size));
                    }
                }
            }
            _ => {}
        }
    }
}

fn dot_position(element: &SvgElement) -> (f64, f64) {
    element
        .children()
        .iter()
        .find(|c| c.get_attr("class") == Some("marker-dot"))
        .map(|dot| {
            let x = dot.get_attr("cx").and_then(|v| v.parse().ok()).unwrap_or(0.0);
            let y = dot.get_attr("cy").and_then(|v| v.parse().ok()).unwrap_or(0.0);
            (x, y)
        })
        .unwrap_or((0.0, 0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::theme::default_theme;
    use flymap_core::MarkerSpec;

    fn renderer() -> MarkerRenderer {
        MarkerRenderer::new(Viewport::default(), default_theme())
    }

    fn directory() -> RegionDirectory {
        RegionDirectory::builtin().unwrap()
    }

    #[test]
    fn test_create_and_remove_marker() {
        let mut r = renderer();
        let handle = r.create_marker("prod-0", "prod", &Style::default(), 100.0, 50.0, &[]);
        assert_eq!(handle.id, "prod-0");
        assert!(r.has_marker("prod-0"));
        assert!(r.to_svg().contains("id=\"prod-0\""));

        assert!(r.remove_marker("prod-0"));
        assert!(!r.remove_marker("prod-0"));
        assert!(!r.to_svg().contains("id=\"prod-0\""));
    }

    #[test]
    fn test_glow_gradient_provisioned_once() {
        let mut r = renderer();
        let style = Style {
            glow: true,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &style, 10.0, 10.0, &[]);
        r.create_marker("m-0", "g", &style, 20.0, 20.0, &[]);
        let svg = r.to_svg();
        assert_eq!(svg.matches("radialGradient").count(), 2); // open + close tag
        assert!(svg.contains("url(#glow-m-0)"));
    }

    #[test]
    fn test_remove_marker_drops_gradient() {
        let mut r = renderer();
        let style = Style {
            glow: true,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &style, 10.0, 10.0, &[]);
        r.remove_marker("m-0");
        assert!(!r.to_svg().contains("radialGradient"));
    }

    #[test]
    fn test_update_unknown_marker_is_noop() {
        let mut r = renderer();
        assert!(!r.update_marker("nope", &MarkerPatch::default()));
    }

    #[test]
    fn test_update_position_in_place() {
        let mut r = renderer();
        r.create_marker("m-0", "g", &Style::default(), 10.0, 10.0, &[]);
        assert!(r.update_marker(
            "m-0",
            &MarkerPatch {
                x: Some(42.0),
                y: Some(24.0),
                style: None,
            }
        ));
        let svg = r.to_svg();
        assert!(svg.contains("cx=\"42\""));
        assert!(svg.contains("cy=\"24\""));
    }

    #[test]
    fn test_update_idempotent() {
        let mut r = renderer();
        let style = Style {
            animation: Animation::Pulse,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &style, 10.0, 10.0, &[]);
        let before = r.to_svg();

        let patch = MarkerPatch {
            x: Some(10.0),
            y: Some(10.0),
            style: Some(style),
        };
        r.update_marker("m-0", &patch);
        r.update_marker("m-0", &patch);

        let after = r.to_svg();
        assert_eq!(before, after);
        assert_eq!(after.matches("<animate").count(), 1);
    }

    #[test]
    fn test_animation_switch_removes_old() {
        let mut r = renderer();
        let pulse = Style {
            animation: Animation::Pulse,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &pulse, 10.0, 10.0, &[]);

        let fade = Style {
            animation: Animation::Fade,
            ..Style::default()
        };
        r.update_marker(
            "m-0",
            &MarkerPatch {
                style: Some(fade),
                ..Default::default()
            },
        );

        let svg = r.to_svg();
        assert_eq!(svg.matches("<animate").count(), 1);
        assert!(svg.contains("attributeName=\"opacity\""));
        assert!(!svg.contains("attributeName=\"r\""));
    }

    #[test]
    fn test_pulse_size_change_updates_values_in_place() {
        let mut r = renderer();
        let style = Style {
            animation: Animation::Pulse,
            size: 5.0,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &style, 10.0, 10.0, &[]);

        let bigger = Style {
            size: 8.0,
            ..style
        };
        r.update_marker(
            "m-0",
            &MarkerPatch {
                style: Some(bigger),
                ..Default::default()
            },
        );

        let svg = r.to_svg();
        assert_eq!(svg.matches("<animate").count(), 1);
        assert!(svg.contains("values=\"8;11;8\""));
    }

    #[test]
    fn test_batch_skips_invalid_markers() {
        let mut r = renderer();
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![
            MarkerSpec::RegionCode("sjc".to_string()),
            MarkerSpec::RegionCode("xyz-invalid".to_string()),
            MarkerSpec::Coordinate(51.5, -0.12),
        ];
        let handles =
            r.create_markers_from_groups(&[group], &Viewport::default(), &directory());
        assert_eq!(handles.len(), 2);
        assert_eq!(r.marker_count(), 2);
    }

    #[test]
    fn test_group_visibility_is_display_only() {
        let mut r = renderer();
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![MarkerSpec::RegionCode("sjc".to_string())];
        r.create_markers_from_groups(&[group], &Viewport::default(), &directory());

        assert!(r.toggle_group_visibility("prod", false));
        assert_eq!(r.marker_count(), 1);
        assert!(r.to_svg().contains("marker-group hidden"));

        assert!(r.toggle_group_visibility("prod", true));
        assert!(!r.to_svg().contains("marker-group hidden"));

        assert!(!r.toggle_group_visibility("ghost", false));
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut r = renderer();
        let style = Style {
            glow: true,
            ..Style::default()
        };
        r.create_marker("m-0", "g", &style, 10.0, 10.0, &[]);
        r.clear();
        assert_eq!(r.marker_count(), 0);
        assert!(!r.to_svg().contains("radialGradient"));
    }

    #[test]
    fn test_labels_carried_as_data_attributes() {
        let mut r = renderer();
        let mut group = MarkerGroup::new("prod", "Production");
        group.markers = vec![MarkerSpec::RegionCode("lhr".to_string())];
        r.create_markers_from_groups(&[group], &Viewport::default(), &directory());
        assert!(r.to_svg().contains("data-label=\"London, United Kingdom\""));
    }
}
