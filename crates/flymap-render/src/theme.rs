//! Theme handling: default custom properties and stylesheet assembly.

use flymap_core::Theme;
use std::collections::BTreeMap;

/// Default theme custom properties, overridden per-key by configuration and
/// by `theme_change` events.
pub fn default_theme() -> Theme {
    Theme(BTreeMap::from([
        ("--map-bg".to_string(), "#1a1b26".to_string()),
        ("--map-outline".to_string(), "#3b3f51".to_string()),
        ("--marker-colour".to_string(), "#24b0a4".to_string()),
        ("--marker-label".to_string(), "#c0caf5".to_string()),
    ]))
}

/// Base rules present in every rendered document. Group hiding is a
/// display-only class so toggling never touches marker elements.
const BASE_RULES: &str = ".marker-group.hidden{display:none}";

/// Builds the `<style>` content for a document: custom properties from the
/// theme plus the base rules. Theme application is a pure style update; no
/// marker geometry is involved.
pub fn style_block(theme: &Theme) -> String {
    let mut css = String::from(":root{");
    for (key, value) in &theme.0 {
        css.push_str(key);
        css.push(':');
        css.push_str(value);
        css.push(';');
    }
    css.push('}');
    css.push_str(BASE_RULES);
    css
}
