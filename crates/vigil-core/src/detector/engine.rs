//! Crisis detection engine: scoring, thresholding, ranking.
//!
//! Each call is a bounded, synchronous computation over one short string: no
//! I/O, no shared mutable state. A single [`CrisisDetector`] can be shared
//! across any number of concurrent conversations.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::{CrisisCategory, Detection, RuleCatalog};

/// Confidence at or above which a message is treated as a crisis.
///
/// Inherited from the funnel's original tuning together with
/// [`SATURATION_MATCHES`] and [`INTENSITY_WEIGHT`]; none of the three has been
/// validated against real escalation data, so treat them as tunable rather
/// than precise.
pub const CRISIS_THRESHOLD: f32 = 0.3;

/// Number of distinct rule matches that saturates confidence at 1.0.
pub const SATURATION_MATCHES: f32 = 3.0;

/// Score added per matched intensity marker.
pub const INTENSITY_WEIGHT: f32 = 0.2;

/// Default cap on input length, in characters.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 4096;

/// Errors returned by the detection operations.
#[derive(Debug, Error)]
pub enum DetectorError {
    /// Input exceeded the configured maximum under [`OversizePolicy::Reject`].
    #[error("input too large: {len} characters (max: {max})")]
    InputTooLarge {
        /// Length of the rejected input, in characters.
        len: usize,
        /// The configured maximum.
        max: usize,
    },
}

/// Policy for input longer than the configured maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Drop everything past the maximum and classify the prefix.
    #[default]
    Truncate,
    /// Refuse the input with [`DetectorError::InputTooLarge`].
    Reject,
}

/// Configuration for the crisis detector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Maximum accepted input length, in characters. Every pattern in the
    /// catalog is evaluated over the full text, so this bounds per-call cost.
    pub max_input_chars: usize,
    /// What to do with input longer than the maximum.
    pub oversize: OversizePolicy,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            max_input_chars: DEFAULT_MAX_INPUT_CHARS,
            oversize: OversizePolicy::Truncate,
        }
    }
}

/// Crisis-signal detector over a fixed rule catalog.
///
/// Immutable after construction; every operation takes `&self` and holds no
/// interior mutability, so the detector is `Send + Sync` by construction and
/// calls from parallel worker pools need no coordination.
pub struct CrisisDetector {
    catalog: RuleCatalog,
    config: DetectorConfig,
}

impl CrisisDetector {
    /// Creates a detector over the built-in Russian catalog.
    pub fn new() -> Self {
        Self::with_catalog(RuleCatalog::russian())
    }

    /// Creates a detector over an explicitly constructed catalog.
    pub fn with_catalog(catalog: RuleCatalog) -> Self {
        Self {
            catalog,
            config: DetectorConfig::default(),
        }
    }

    /// Creates a detector with a custom catalog and config.
    pub fn with_config(catalog: RuleCatalog, config: DetectorConfig) -> Self {
        Self { catalog, config }
    }

    /// Returns the catalog this detector classifies against.
    pub fn catalog(&self) -> &RuleCatalog {
        &self.catalog
    }

    /// Classifies a message into the single most likely crisis category.
    ///
    /// Empty or all-whitespace input yields `(None, 0.0)`. A category is only
    /// reported when its confidence reaches [`CRISIS_THRESHOLD`]; below that
    /// the detection carries [`CrisisCategory::None`] together with the raw
    /// confidence, so callers can still inspect borderline scores.
    ///
    /// Fails only under [`OversizePolicy::Reject`]; with the default
    /// truncation policy this is total for any UTF-8 input.
    pub fn classify(&self, text: &str) -> Result<Detection, DetectorError> {
        let Some(normalized) = self.normalize(text)? else {
            return Ok(Detection::none());
        };

        // `category_scores` yields escalation-priority order and only a
        // strictly greater score displaces the current best, so ties resolve
        // toward the more urgent category.
        let mut best = (CrisisCategory::None, 0.0f32);
        for (category, score) in self.category_scores(&normalized) {
            if score > best.1 {
                best = (category, score);
            }
        }

        let confidence = (best.1 / SATURATION_MATCHES).min(1.0);
        let detection = if confidence >= CRISIS_THRESHOLD {
            Detection::new(best.0, confidence)
        } else {
            Detection::new(CrisisCategory::None, confidence)
        };

        debug!(
            category = detection.category.as_str(),
            confidence = detection.confidence,
            "classified message"
        );
        Ok(detection)
    }

    /// Ranks every crisis category whose confidence reaches `threshold`.
    ///
    /// Scoring is identical to [`classify`](Self::classify), including the
    /// shared intensity bonus, but every qualifying category is returned,
    /// sorted by descending confidence. Equal confidences keep
    /// escalation-priority order (the stable secondary key). The `None`
    /// sentinel never appears: absence of a category means "not triggered".
    /// Empty input yields an empty vec.
    pub fn rank_crises(
        &self,
        text: &str,
        threshold: f32,
    ) -> Result<Vec<Detection>, DetectorError> {
        let Some(normalized) = self.normalize(text)? else {
            return Ok(Vec::new());
        };

        let mut ranked: Vec<Detection> = self
            .category_scores(&normalized)
            .into_iter()
            .map(|(category, score)| {
                Detection::new(category, (score / SATURATION_MATCHES).min(1.0))
            })
            .filter(|d| d.confidence >= threshold)
            .collect();

        // Stable sort; input order is escalation priority.
        ranked.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        Ok(ranked)
    }

    /// Per-category scores (distinct rule matches plus the shared intensity
    /// bonus), in escalation-priority order.
    fn category_scores(&self, text_lower: &str) -> Vec<(CrisisCategory, f32)> {
        let intensity_bonus = self
            .catalog
            .intensity_markers()
            .count_matches(text_lower) as f32
            * INTENSITY_WEIGHT;

        CrisisCategory::detectable()
            .iter()
            .filter_map(|&category| {
                let rules = self.catalog.rules_for(category)?;
                let raw = rules.count_matches(text_lower) as f32;
                Some((category, raw + intensity_bonus))
            })
            .collect()
    }

    /// Applies the length policy and lowercases the text.
    ///
    /// Returns `Ok(None)` for empty or all-whitespace input.
    fn normalize(&self, text: &str) -> Result<Option<String>, DetectorError> {
        let len = text.chars().count();
        let max = self.config.max_input_chars;

        let text = if len > max {
            match self.config.oversize {
                OversizePolicy::Reject => {
                    return Err(DetectorError::InputTooLarge { len, max });
                }
                OversizePolicy::Truncate => {
                    warn!(len, max, "truncating oversized input");
                    let end = text
                        .char_indices()
                        .nth(max)
                        .map(|(i, _)| i)
                        .unwrap_or(text.len());
                    &text[..end]
                }
            }
        } else {
            text
        };

        if text.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(text.to_lowercase()))
    }
}

impl Default for CrisisDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> CrisisDetector {
        CrisisDetector::new()
    }

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    // === Empty input ===

    #[test]
    fn empty_input_returns_none() {
        let d = detector().classify("").unwrap();
        assert_eq!(d.category, CrisisCategory::None);
        assert_eq!(d.confidence, 0.0);
    }

    #[test]
    fn whitespace_only_returns_none() {
        let d = detector().classify("   \n\t  ").unwrap();
        assert_eq!(d.category, CrisisCategory::None);
        assert_eq!(d.confidence, 0.0);
    }

    // === Psychosis ===

    #[test]
    fn detects_psychosis_voices_and_visions() {
        let d = detector()
            .classify("слышу голоса в голове, вижу труп")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Psychosis);
        assert!(d.confidence >= 0.66);
    }

    #[test]
    fn detects_psychosis_in_caps_lock_noise() {
        let d = detector()
            .classify("СЛЫШУ ГОЛОСА В ГОЛОВЕ! КАРТИНА СМЕРТИ перед глазами")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Psychosis);
    }

    // === Suicide ===

    #[test]
    fn detects_suicidal_ideation() {
        let d = detector()
            .classify("хочу умереть, жизнь не имеет смысла")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Suicide);
        assert!(d.confidence >= 0.66);
    }

    #[test]
    fn three_distinct_rule_matches_saturate_confidence() {
        let d = detector()
            .classify("хочу умереть, не хочу жить, жизнь не имеет смысла")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Suicide);
        assert_eq!(d.confidence, 1.0);
    }

    // === Panic ===

    #[test]
    fn detects_panic_with_intensity_markers() {
        // Two panic rules plus two intensity markers: (2 + 2 * 0.2) / 3 = 0.8.
        let d = detector()
            .classify("не могу дышать, сердце колотится, помогите срочно")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Panic);
        assert!(approx(d.confidence, 0.8));
    }

    #[test]
    fn detects_extreme_stress() {
        let d = detector()
            .classify("крайний стресс, не могу успокоиться, всё рушится")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Panic);
        assert_eq!(d.confidence, 1.0);
    }

    // === Threats ===

    #[test]
    fn detects_threats_to_life() {
        let d = detector()
            .classify("мне угрожают, сказали что убьют, хотят убить меня")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::Threats);
        assert!(d.confidence >= 0.66);
    }

    // === No crisis ===

    #[test]
    fn everyday_problems_are_not_a_crisis() {
        let d = detector()
            .classify("у меня прокрастинация и низкая самооценка")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::None);
        assert!(d.confidence < 0.3);
    }

    #[test]
    fn ordinary_request_is_not_a_crisis() {
        let d = detector()
            .classify("здравствуйте, хочу решить проблему с тревогой перед выступлениями")
            .unwrap();
        assert_eq!(d.category, CrisisCategory::None);
    }

    #[test]
    fn intensity_markers_alone_stay_below_threshold() {
        // Markers amplify rule matches; with zero rule matches the score
        // stays under the crisis threshold.
        let d = detector().classify("помогите срочно").unwrap();
        assert_eq!(d.category, CrisisCategory::None);
        assert!(d.confidence > 0.0);
        assert!(d.confidence < CRISIS_THRESHOLD);
    }

    // === Score behavior ===

    #[test]
    fn confidence_is_monotonic_in_matches() {
        let det = detector();
        let base = det.classify("хочу умереть").unwrap().confidence;
        let plus_marker = det.classify("хочу умереть, помогите").unwrap().confidence;
        let plus_two = det
            .classify("хочу умереть, помогите срочно")
            .unwrap()
            .confidence;
        assert!(plus_marker >= base);
        assert!(plus_two >= plus_marker);
    }

    #[test]
    fn classification_is_idempotent() {
        let det = detector();
        let text = "не могу дышать, помогите срочно";
        let first = det.classify(text).unwrap();
        let second = det.classify(text).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn tie_breaks_toward_more_urgent_category() {
        // One suicide rule and one threats rule, equal scores: suicidal
        // ideation wins the tie.
        let d = detector().classify("хочу умереть, ищут меня").unwrap();
        assert_eq!(d.category, CrisisCategory::Suicide);
        assert!(approx(d.confidence, 1.0 / 3.0));
    }

    // === rank_crises ===

    #[test]
    fn rank_empty_input_returns_empty() {
        let ranked = detector().rank_crises("", CRISIS_THRESHOLD).unwrap();
        assert!(ranked.is_empty());
        let ranked = detector().rank_crises("   ", CRISIS_THRESHOLD).unwrap();
        assert!(ranked.is_empty());
    }

    #[test]
    fn rank_returns_concurrent_crises_in_priority_order() {
        // Equal confidences: escalation priority decides the order.
        let ranked = detector()
            .rank_crises("хочу умереть, ищут меня", CRISIS_THRESHOLD)
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].category, CrisisCategory::Suicide);
        assert_eq!(ranked[1].category, CrisisCategory::Threats);
        assert!(approx(ranked[0].confidence, ranked[1].confidence));
    }

    #[test]
    fn rank_sorts_by_descending_confidence() {
        let ranked = detector()
            .rank_crises("хочу умереть, не хочу жить, ищут меня", CRISIS_THRESHOLD)
            .unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].category, CrisisCategory::Suicide);
        assert_eq!(ranked[1].category, CrisisCategory::Threats);
        assert!(ranked[0].confidence > ranked[1].confidence);
    }

    #[test]
    fn rank_never_contains_the_none_sentinel() {
        let det = detector();
        for text in [
            "хочу умереть",
            "обычное сообщение",
            "не могу дышать, помогите",
        ] {
            let ranked = det.rank_crises(text, 0.0).unwrap();
            assert!(ranked.iter().all(|d| d.category != CrisisCategory::None));
        }
    }

    #[test]
    fn rank_with_zero_threshold_is_superset_of_classify() {
        let det = detector();
        let text = "слышу голоса в голове, вижу труп";
        let best = det.classify(text).unwrap();
        assert!(best.is_crisis());

        let ranked = det.rank_crises(text, 0.0).unwrap();
        assert_eq!(ranked[0].category, best.category);
        assert!(approx(ranked[0].confidence, best.confidence));
        for pair in ranked.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn rank_respects_threshold_override() {
        let det = detector();
        let text = "хочу умереть, ищут меня";
        // Each category sits at 1/3 confidence; a higher threshold drops both.
        assert_eq!(det.rank_crises(text, 0.5).unwrap().len(), 0);
        assert_eq!(det.rank_crises(text, CRISIS_THRESHOLD).unwrap().len(), 2);
    }

    // === Oversized input ===

    #[test]
    fn oversized_input_rejected_when_configured() {
        let det = CrisisDetector::with_config(
            RuleCatalog::russian(),
            DetectorConfig {
                max_input_chars: 32,
                oversize: OversizePolicy::Reject,
            },
        );
        let text = "а".repeat(33);
        match det.classify(&text) {
            Err(DetectorError::InputTooLarge { len, max }) => {
                assert_eq!(len, 33);
                assert_eq!(max, 32);
            }
            other => panic!("expected InputTooLarge, got {other:?}"),
        }
        assert!(det.rank_crises(&text, CRISIS_THRESHOLD).is_err());
    }

    #[test]
    fn oversized_input_truncated_by_default() {
        let det = CrisisDetector::with_config(
            RuleCatalog::russian(),
            DetectorConfig {
                max_input_chars: 16,
                oversize: OversizePolicy::Truncate,
            },
        );
        // The crisis phrase fits inside the limit; the padding does not.
        let text = format!("хочу умереть{}", " и вот длинный хвост".repeat(10));
        let d = det.classify(&text).unwrap();
        assert_eq!(d.category, CrisisCategory::Suicide);
    }

    #[test]
    fn truncation_drops_text_past_the_limit() {
        let det = CrisisDetector::with_config(
            RuleCatalog::russian(),
            DetectorConfig {
                max_input_chars: 16,
                oversize: OversizePolicy::Truncate,
            },
        );
        // "просто текст тут" is exactly 16 characters; the crisis phrase
        // after it is cut away.
        let d = det.classify("просто текст тут хочу умереть").unwrap();
        assert_eq!(d.category, CrisisCategory::None);
    }
}
