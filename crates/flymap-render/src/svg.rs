//! Minimal SVG element tree.
//!
//! The renderer mutates elements in place and serializes the whole document
//! on demand, so this stays a plain owned tree rather than a retained-mode
//! scene graph. Attribute order is stable (BTreeMap) to keep output
//! deterministic for tests and diffing.

use std::collections::BTreeMap;
use std::fmt::Write;

/// One SVG element: tag, attributes, children, optional text content.
#[derive(Debug, Clone, PartialEq)]
pub struct SvgElement {
    tag: String,
    attrs: BTreeMap<String, String>,
    children: Vec<SvgElement>,
    text: Option<String>,
}

impl SvgElement {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Builder-style attribute setter.
    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Builder-style text content setter.
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style child appender.
    pub fn child(mut self, child: SvgElement) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn get_attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        self.attrs.remove(key)
    }

    pub fn push_child(&mut self, child: SvgElement) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[SvgElement] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<SvgElement> {
        &mut self.children
    }

    /// First child with the given tag.
    pub fn find_child_mut(&mut self, tag: &str) -> Option<&mut SvgElement> {
        self.children.iter_mut().find(|c| c.tag == tag)
    }

    pub fn find_child(&self, tag: &str) -> Option<&SvgElement> {
        self.children.iter().find(|c| c.tag == tag)
    }

    /// Removes every child with the given tag, returning how many went away.
    pub fn remove_children(&mut self, tag: &str) -> usize {
        let before = self.children.len();
        self.children.retain(|c| c.tag != tag);
        before - self.children.len()
    }

    /// Serializes this element and its subtree.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out);
        out
    }

    fn render_into(&self, out: &mut String) {
        let _ = write!(out, "<{}", self.tag);
        for (key, value) in &self.attrs {
            let _ = write!(out, " {}=\"{}\"", key, escape(value));
        }

        if self.children.is_empty() && self.text.is_none() {
            out.push_str("/>");
            return;
        }

        out.push('>');
        if let Some(text) = &self.text {
            out.push_str(&escape(text));
        }
        for child in &self.children {
            child.render_into(out);
        }
        let _ = write!(out, "</{}>", self.tag);
    }
}

/// Escapes text for use in attribute values and element content.
fn escape(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Formats a float attribute without trailing noise.
pub fn fmt_num(value: f64) -> String {
    if (value - value.round()).abs() < 1e-9 {
        format!("{}", value.round() as i64)
    } else {
        format!("{value:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_closing_element() {
        let el = SvgElement::new("circle")
            .attr("cx", "10")
            .attr("cy", "20")
            .attr("r", "5");
        assert_eq!(el.render(), r#"<circle cx="10" cy="20" r="5"/>"#);
    }

    #[test]
    fn test_nested_elements_and_text() {
        let el = SvgElement::new("g")
            .attr("id", "m-1")
            .child(SvgElement::new("title").text("London & Paris"));
        assert_eq!(
            el.render(),
            r#"<g id="m-1"><title>London &amp; Paris</title></g>"#
        );
    }

    #[test]
    fn test_attribute_escaping() {
        let el = SvgElement::new("g").attr("data-label", "a \"b\" <c>");
        assert!(el.render().contains("a &quot;b&quot; &lt;c&gt;"));
    }

    #[test]
    fn test_child_manipulation() {
        let mut el = SvgElement::new("circle").child(SvgElement::new("animate"));
        assert!(el.find_child("animate").is_some());
        assert_eq!(el.remove_children("animate"), 1);
        assert!(el.find_child("animate").is_none());
    }

    #[test]
    fn test_fmt_num() {
        assert_eq!(fmt_num(400.0), "400");
        assert_eq!(fmt_num(166.934), "166.93");
    }
}
