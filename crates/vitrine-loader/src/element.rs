//! Image element model
//!
//! Mirrors the parts of an `<img>` the loader reads and writes: `src`, the
//! `data-*` attribute contract, classes, layout and the visual style driven
//! by transitions. The host copies changes back into its real DOM.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::viewport::Rect;

/// Handle returned by [`crate::Scheduler::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub(crate) u64);

impl ElementId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "img#{}", self.0)
    }
}

/// Inline visual state
#[derive(Debug, Clone, PartialEq)]
pub struct VisualStyle {
    pub blur_px: f32,
    pub scale: f32,
    pub opacity: f32,
    /// CSS `transition` value
    pub transition: Option<String>,
}

impl Default for VisualStyle {
    fn default() -> Self {
        Self {
            blur_px: 0.0,
            scale: 1.0,
            opacity: 1.0,
            transition: None,
        }
    }
}

impl VisualStyle {
    /// Inline `style` attribute text
    pub fn to_css(&self) -> String {
        let mut css = format!(
            "filter: blur({}px); transform: scale({}); opacity: {};",
            self.blur_px, self.scale, self.opacity
        );
        if let Some(transition) = &self.transition {
            css.push_str(&format!(" transition: {};", transition));
        }
        css
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageElement {
    pub src: String,
    /// `src` as first declared; later swaps do not change the resource
    declared_src: String,
    attributes: BTreeMap<String, String>,
    classes: BTreeSet<String>,
    pub style: VisualStyle,
    /// Bounding box in document coordinates
    pub rect: Rect,
    /// Hover container the element belongs to
    pub container: Option<String>,
}

impl ImageElement {
    pub fn new(src: &str) -> Self {
        Self {
            src: src.to_string(),
            declared_src: src.to_string(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.set_attr(name, value);
        self
    }

    pub fn with_rect(mut self, rect: Rect) -> Self {
        self.rect = rect;
        self
    }

    pub fn in_container(mut self, container: &str) -> Self {
        self.container = Some(container.to_string());
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attributes.insert(name.to_string(), value.to_string());
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    /// Resource to load: `data-src`, else the declared `src`
    pub fn resource(&self) -> Option<&str> {
        self.attr("data-src")
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.declared_src.as_str()).filter(|s| !s.is_empty()))
    }

    pub fn fallback(&self) -> Option<&str> {
        self.attr("data-fallback").filter(|s| !s.is_empty())
    }

    pub fn is_lazy(&self) -> bool {
        self.has_attr("data-lazy")
    }

    pub fn is_progressive(&self) -> bool {
        self.has_attr("data-progressive")
    }

    pub fn is_critical(&self) -> bool {
        self.has_attr("data-critical")
    }

    pub fn width_hint(&self) -> Option<u32> {
        self.attr("data-width").and_then(|v| v.trim().parse().ok())
    }

    pub fn height_hint(&self) -> Option<u32> {
        self.attr("data-height").and_then(|v| v.trim().parse().ok())
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn add_class(&mut self, class: &str) {
        self.classes.insert(class.to_string());
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.remove(class);
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }
}
