//! Placeholder-to-image transitions
//!
//! Progressive images show their placeholder blurred and slightly enlarged.
//! On reveal the source is swapped at once and the blur and scale are
//! removed after a short delay. Lazy images fade in instead. Time is passed
//! in by the caller so the controller never sleeps.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::config::TransitionConfig;
use crate::element::{ElementId, ImageElement};

pub const CLASS_LOADING: &str = "progressive-loading";
pub const CLASS_LOADED: &str = "progressive-loaded";
pub const CLASS_ERROR: &str = "progressive-error";

/// Notification emitted once a transition finishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionEvent {
    /// A progressive image finished revealing
    ProgressiveLoad { id: ElementId, src: String },
    /// A lazy image finished fading in
    FadedIn { id: ElementId },
}

#[derive(Debug, Clone)]
enum Step {
    Reveal { src: String },
    Fade,
}

#[derive(Debug, Clone)]
struct Scheduled {
    id: ElementId,
    due: Instant,
    step: Step,
}

#[derive(Debug)]
pub struct TransitionController {
    config: TransitionConfig,
    scheduled: Vec<Scheduled>,
}

impl TransitionController {
    pub fn new(config: TransitionConfig) -> Self {
        Self { config, scheduled: Vec::new() }
    }

    pub fn config(&self) -> &TransitionConfig {
        &self.config
    }

    /// Show `placeholder` blurred and scaled
    pub fn begin_placeholder(&self, element: &mut ImageElement, placeholder: &str) {
        let ms = self.config.duration_ms;
        element.style.transition = Some(format!("filter {ms}ms ease-out, transform {ms}ms ease-out"));
        element.style.blur_px = self.config.blur_radius;
        element.style.scale = self.config.placeholder_scale;
        element.add_class(CLASS_LOADING);
        element.src = placeholder.to_string();
    }

    /// Swap to the full source now and clear the blur after the reveal delay
    pub fn reveal(&mut self, id: ElementId, element: &mut ImageElement, src: &str, now: Instant) {
        element.src = src.to_string();
        self.cancel(id);
        self.scheduled.push(Scheduled {
            id,
            due: now + self.config.reveal_delay(),
            step: Step::Reveal { src: src.to_string() },
        });
    }

    /// Swap to `src` and fade from transparent to opaque
    pub fn fade_in(&mut self, id: ElementId, element: &mut ImageElement, src: &str, now: Instant) {
        element.src = src.to_string();
        element.style.opacity = 0.0;
        element.style.transition = Some(format!("opacity {}s ease-in", self.config.fade_ms as f64 / 1000.0));
        self.cancel(id);
        self.scheduled.push(Scheduled { id, due: now, step: Step::Fade });
    }

    /// Mark a failed load
    pub fn fail(&mut self, id: ElementId, element: &mut ImageElement) {
        self.cancel(id);
        element.remove_class(CLASS_LOADING);
        element.add_class(CLASS_ERROR);
    }

    /// Drop anything scheduled for `id`
    pub fn cancel(&mut self, id: ElementId) {
        self.scheduled.retain(|s| s.id != id);
    }

    pub fn pending(&self) -> usize {
        self.scheduled.len()
    }

    /// Complete every step due at `now`. Steps for elements no longer in
    /// `elements` are dropped silently.
    pub fn advance(&mut self, now: Instant, elements: &mut BTreeMap<ElementId, ImageElement>) -> Vec<TransitionEvent> {
        let (due, waiting): (Vec<_>, Vec<_>) = self.scheduled.drain(..).partition(|s| s.due <= now);
        self.scheduled = waiting;

        let mut events = Vec::new();
        for scheduled in due {
            let Some(element) = elements.get_mut(&scheduled.id) else {
                continue;
            };
            match scheduled.step {
                Step::Reveal { src } => {
                    element.style.blur_px = 0.0;
                    element.style.scale = 1.0;
                    element.remove_class(CLASS_LOADING);
                    element.add_class(CLASS_LOADED);
                    events.push(TransitionEvent::ProgressiveLoad { id: scheduled.id, src });
                }
                Step::Fade => {
                    element.style.opacity = 1.0;
                    events.push(TransitionEvent::FadedIn { id: scheduled.id });
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn setup() -> (TransitionController, BTreeMap<ElementId, ImageElement>, ElementId) {
        let id = ElementId(1);
        let mut elements = BTreeMap::new();
        elements.insert(id, ImageElement::new("a.jpg").with_attr("data-progressive", "true"));
        (TransitionController::new(TransitionConfig::default()), elements, id)
    }

    #[test]
    fn test_placeholder_phase() {
        let (controller, mut elements, id) = setup();
        let el = elements.get_mut(&id).unwrap();
        controller.begin_placeholder(el, "data:image/png;base64,AAAA");

        assert_eq!(el.src, "data:image/png;base64,AAAA");
        assert_eq!(el.style.blur_px, 10.0);
        assert_eq!(el.style.scale, 1.05);
        assert!(el.has_class(CLASS_LOADING));
        assert_eq!(el.style.transition.as_deref(), Some("filter 600ms ease-out, transform 600ms ease-out"));
    }

    #[test]
    fn test_reveal_after_delay() {
        let (mut controller, mut elements, id) = setup();
        let now = Instant::now();
        let el = elements.get_mut(&id).unwrap();
        controller.begin_placeholder(el, "data:x");
        controller.reveal(id, el, "blob:vitrine/1", now);
        assert_eq!(el.src, "blob:vitrine/1");

        assert!(controller.advance(now + Duration::from_millis(50), &mut elements).is_empty());
        assert_eq!(elements[&id].style.blur_px, 10.0);

        let events = controller.advance(now + Duration::from_millis(100), &mut elements);
        assert_eq!(events, vec![TransitionEvent::ProgressiveLoad { id, src: "blob:vitrine/1".into() }]);
        let el = &elements[&id];
        assert_eq!((el.style.blur_px, el.style.scale), (0.0, 1.0));
        assert!(el.has_class(CLASS_LOADED));
        assert!(!el.has_class(CLASS_LOADING));
    }

    #[test]
    fn test_fade_in() {
        let (mut controller, mut elements, id) = setup();
        let now = Instant::now();
        controller.fade_in(id, elements.get_mut(&id).unwrap(), "blob:vitrine/2", now);
        assert_eq!(elements[&id].style.opacity, 0.0);
        assert_eq!(elements[&id].style.transition.as_deref(), Some("opacity 0.4s ease-in"));

        controller.advance(now, &mut elements);
        assert_eq!(elements[&id].style.opacity, 1.0);
    }

    #[test]
    fn test_removed_element_dropped() {
        let (mut controller, mut elements, id) = setup();
        let now = Instant::now();
        controller.reveal(id, elements.get_mut(&id).unwrap(), "blob:vitrine/3", now);
        elements.clear();

        assert!(controller.advance(now + Duration::from_secs(1), &mut elements).is_empty());
        assert_eq!(controller.pending(), 0);
    }

    #[test]
    fn test_fail_marks_error() {
        let (mut controller, mut elements, id) = setup();
        let el = elements.get_mut(&id).unwrap();
        controller.begin_placeholder(el, "data:x");
        controller.fail(id, el);
        assert!(el.has_class(CLASS_ERROR));
        assert!(!el.has_class(CLASS_LOADING));
    }
}
