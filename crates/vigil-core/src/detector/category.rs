//! Crisis categories for message classification.

use serde::{Deserialize, Serialize};

/// Crisis categories that a message can be classified into.
///
/// The string identifiers produced by serde (`"psychosis"`, `"suicide"`,
/// `"panic"`, `"threats"`, `"none"`) are stable and used for logging and
/// interop with the conversation handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisCategory {
    /// Psychotic episode: voices, visions, hallucinations, paranoia.
    Psychosis,
    /// Suicidal ideation.
    Suicide,
    /// Panic attack or extreme acute stress.
    Panic,
    /// Threats to the user's life from other people.
    Threats,
    /// No crisis detected.
    None,
}

impl CrisisCategory {
    /// Returns the detectable categories in escalation-priority order.
    ///
    /// The order doubles as the tie-break between equal-scoring categories:
    /// suicidal ideation is escalated over external threats, threats over
    /// psychosis, psychosis over panic. The `None` sentinel is not listed
    /// because no detection rules belong to it.
    pub fn detectable() -> &'static [CrisisCategory] {
        &[
            CrisisCategory::Suicide,
            CrisisCategory::Threats,
            CrisisCategory::Psychosis,
            CrisisCategory::Panic,
        ]
    }

    /// Returns the stable string identifier for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisCategory::Psychosis => "psychosis",
            CrisisCategory::Suicide => "suicide",
            CrisisCategory::Panic => "panic",
            CrisisCategory::Threats => "threats",
            CrisisCategory::None => "none",
        }
    }

    /// Returns a human-readable name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            CrisisCategory::Psychosis => "Psychosis",
            CrisisCategory::Suicide => "Suicidal Ideation",
            CrisisCategory::Panic => "Panic",
            CrisisCategory::Threats => "External Threats",
            CrisisCategory::None => "No Crisis",
        }
    }
}

/// Result of classifying a single message.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// The detected category (`None` when below the crisis threshold).
    pub category: CrisisCategory,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
}

impl Detection {
    /// Creates a new detection, clamping confidence to [0.0, 1.0].
    pub fn new(category: CrisisCategory, confidence: f32) -> Self {
        Self {
            category,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// Creates the "no crisis" detection with zero confidence.
    pub fn none() -> Self {
        Self {
            category: CrisisCategory::None,
            confidence: 0.0,
        }
    }

    /// Returns true if a crisis category was detected.
    pub fn is_crisis(&self) -> bool {
        self.category != CrisisCategory::None
    }
}
