//! Vitrine Loader
//!
//! Page-side scheduling: which images to fetch and when, and how each one
//! moves from placeholder to full image.

pub mod config;
pub mod viewport;
pub mod element;
pub mod transition;
pub mod scheduler;

pub use config::{LoaderConfig, TransitionConfig};
pub use viewport::{Rect, Viewport};
pub use element::{ElementId, ImageElement, VisualStyle};
pub use transition::{TransitionController, TransitionEvent};
pub use scheduler::{IdleOutcome, LoadOutcome, LoadState, ScheduleTrigger, Scheduler, SchedulerStats, ScrollDirection};
pub use vitrine_cache::ConfigError;
