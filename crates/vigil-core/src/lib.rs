//! Vigil Core - Crisis-signal classification for the intake funnel.
//!
//! The surrounding bot (command dispatch, messaging, LLM persona) treats this
//! crate as a pure collaborator: it hands over raw user text and branches on
//! the typed result. See [`detector`] for the classification contract.

pub mod detector;

pub use detector::{
    CrisisCategory, CrisisDetector, Detection, DetectorConfig, DetectorError, RuleCatalog,
    CRISIS_THRESHOLD,
};
