//! Crisis-signal detection for intake conversations.
//!
//! Scans free-form user text for indicators of acute psychological danger
//! (psychosis, suicidal ideation, panic, external threats) so the
//! conversation handler can short-circuit the funnel and escalate to a human.

mod catalog;
mod category;
mod engine;

pub use catalog::{CatalogConfig, CatalogError, CategoryRuleConfig, PatternSet, RuleCatalog};
pub use category::{CrisisCategory, Detection};
pub use engine::{
    CrisisDetector, DetectorConfig, DetectorError, OversizePolicy, CRISIS_THRESHOLD,
    DEFAULT_MAX_INPUT_CHARS, INTENSITY_WEIGHT, SATURATION_MATCHES,
};
