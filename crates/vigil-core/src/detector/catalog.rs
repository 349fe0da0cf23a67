//! Rule catalog: declarative detection patterns per crisis category.
//!
//! The catalog is data, not control flow. Patterns live in a serde-friendly
//! [`CatalogConfig`] so a rule set can be reviewed, versioned, and unit-tested
//! independently of the matching engine, then compiled once into an immutable
//! [`RuleCatalog`]. Compilation fails fast on any invalid pattern; nothing can
//! fail at classification time.

use regex::{Regex, RegexSet, RegexSetBuilder};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::CrisisCategory;

/// Errors raised while building a rule catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// A pattern failed to compile.
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// The `none` sentinel carries no detection rules by definition.
    #[error("the `none` sentinel cannot carry detection rules")]
    SentinelCategory,

    /// A category appeared more than once in the config.
    #[error("category `{0}` listed more than once")]
    DuplicateCategory(&'static str),
}

/// A compiled set of case-insensitive patterns.
///
/// Backed by a [`RegexSet`] so one pass over the text reports every matching
/// pattern. The pattern sources are retained for introspection.
#[derive(Debug, Clone)]
pub struct PatternSet {
    set: RegexSet,
    patterns: Vec<String>,
}

impl PatternSet {
    /// Compiles a set of patterns, failing fast on the first invalid one.
    pub fn compile<I, S>(patterns: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let patterns: Vec<String> = patterns.into_iter().map(Into::into).collect();
        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| {
                let pattern = patterns
                    .iter()
                    .find(|p| Regex::new(p).is_err())
                    .cloned()
                    .unwrap_or_default();
                CatalogError::InvalidPattern { pattern, source }
            })?;

        Ok(Self { set, patterns })
    }

    /// Returns the number of distinct patterns that match somewhere in `text`.
    ///
    /// Each pattern contributes at most 1 no matter how many times it occurs
    /// in the text. The caller's text is never mutated.
    pub fn count_matches(&self, text: &str) -> usize {
        self.set.matches(text).iter().count()
    }

    /// Returns true if any pattern in the set matches `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.set.is_match(text)
    }

    /// Returns the pattern sources in declaration order.
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the number of patterns in the set.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Returns true if the set contains no patterns.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Detection rules for a single category.
#[derive(Debug, Clone)]
struct CategoryRules {
    category: CrisisCategory,
    rules: PatternSet,
}

/// Immutable catalog of per-category detection rules plus the shared
/// intensity markers.
///
/// Read-only after construction; extending the rule set means building a new
/// catalog, never mutating this one.
#[derive(Debug, Clone)]
pub struct RuleCatalog {
    categories: Vec<CategoryRules>,
    intensity_markers: PatternSet,
}

impl RuleCatalog {
    /// Builds the built-in Russian-language catalog.
    pub fn russian() -> Self {
        // Built-in patterns are validated by unit test; compilation cannot
        // fail at runtime.
        Self::from_config(CatalogConfig::russian()).expect("built-in patterns are valid")
    }

    /// Builds a catalog from a declarative config.
    ///
    /// Fails fast on the first invalid pattern so a broken rule set is caught
    /// at startup, never at classification time.
    pub fn from_config(config: CatalogConfig) -> Result<Self, CatalogError> {
        let mut categories: Vec<CategoryRules> = Vec::with_capacity(config.categories.len());

        for entry in config.categories {
            if entry.category == CrisisCategory::None {
                return Err(CatalogError::SentinelCategory);
            }
            if categories.iter().any(|c| c.category == entry.category) {
                return Err(CatalogError::DuplicateCategory(entry.category.as_str()));
            }
            categories.push(CategoryRules {
                category: entry.category,
                rules: PatternSet::compile(entry.patterns)?,
            });
        }

        let intensity_markers = PatternSet::compile(config.intensity_markers)?;

        Ok(Self {
            categories,
            intensity_markers,
        })
    }

    /// Returns the detection rules for `category`, if the catalog has any.
    pub fn rules_for(&self, category: CrisisCategory) -> Option<&PatternSet> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| &c.rules)
    }

    /// Iterates over (category, rules) pairs in catalog order.
    pub fn category_rules(&self) -> impl Iterator<Item = (CrisisCategory, &PatternSet)> {
        self.categories.iter().map(|c| (c.category, &c.rules))
    }

    /// Returns the shared intensity markers.
    pub fn intensity_markers(&self) -> &PatternSet {
        &self.intensity_markers
    }
}

impl Default for RuleCatalog {
    fn default() -> Self {
        Self::russian()
    }
}

/// Detection rules for one category, as configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRuleConfig {
    /// The category these patterns provide evidence for.
    pub category: CrisisCategory,
    /// Regex patterns, matched case-insensitively over lowercased text.
    pub patterns: Vec<String>,
}

/// Declarative description of a rule catalog.
///
/// The loader that fetches a config from disk or network is the caller's
/// concern; this type only defines the shape and the JSON parsing helper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Detection rules per category.
    pub categories: Vec<CategoryRuleConfig>,
    /// Intensity markers shared across all categories.
    #[serde(default)]
    pub intensity_markers: Vec<String>,
}

impl CatalogConfig {
    /// Parses a catalog config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// The built-in Russian-language rule set.
    ///
    /// Patterns tolerate inflectional endings, intervening words, and the
    /// usual real-world noise (typos aside): `голос[аы]?` covers singular and
    /// plural, `.+` bridges words, and matching is case-insensitive.
    pub fn russian() -> Self {
        Self {
            categories: vec![
                CategoryRuleConfig {
                    category: CrisisCategory::Suicide,
                    patterns: owned(&[
                        r"хоч[уа]\s+(умереть|покончить|убить\s+себя)",
                        r"не\s+хоч[уа]\s+жить",
                        r"лучше\s+(бы\s+)?умереть",
                        r"жизнь\s+не\s+имеет\s+смысл",
                        r"(суицид|самоубийств)",
                        r"уйти\s+из\s+жизни",
                        r"(свести\s+счёты|сведу\s+счёты)\s+с\s+жизнь[ю]",
                    ]),
                },
                CategoryRuleConfig {
                    category: CrisisCategory::Threats,
                    patterns: owned(&[
                        r"угрожа[ю]т.+(убить|найти|расправиться)",
                        r"сказали\s+что\s+(найдут|убь[ю]т)",
                        r"бо[ю]сь\s+за\s+(жизнь|детей|семь[ю])",
                        r"ищ[уа]т\s+меня",
                        r"хот[ия]т\s+убить",
                        r"угрозы.+(жизни|смерть[ю])",
                    ]),
                },
                CategoryRuleConfig {
                    category: CrisisCategory::Psychosis,
                    patterns: owned(&[
                        r"голос[аы]?\s+(в|внутри)\s+голов[еы]",
                        r"слыш[уа]\s+(голос[аы]|в\s+голове)",
                        r"виж[уа]\s+(труп|смерть|видени[ея])",
                        r"(галлюцинаци[ия]|бред)",
                        r"говор[ия]т\s+(мне|со\s+мной).+голос",
                        r"(нереальн|не\s+понима[ю])\s+что\s+реальн",
                        r"(параноя|преследу[ю]т)",
                        r"картина\s+смерти",
                        r"голос[аы]?\s+(приказыва|говор)",
                        r"не\s+(реальн|существу)",
                        r"бог\s+(говорит|сказал)",
                    ]),
                },
                CategoryRuleConfig {
                    category: CrisisCategory::Panic,
                    patterns: owned(&[
                        r"не\s+могу\s+дышать",
                        r"серд[цо]е\s+(бьётся|колотится)",
                        r"паническ[ая]\s+атак",
                        r"задыха[ю]сь",
                        r"(крайни[йе]|экстремальн[ыйое])\s+стресс",
                        r"не\s+могу\s+успокоиться",
                        r"всё\s+(рушится|падает)",
                    ]),
                },
            ],
            intensity_markers: owned(&[
                r"помог[ий]те",
                r"срочно",
                r"спасите",
                r"не\s+знаю\s+что\s+делать",
                r"прямо\s+сейчас",
                r"очень\s+страшно",
            ]),
        }
    }
}

fn owned(patterns: &[&str]) -> Vec<String> {
    patterns.iter().map(|p| p.to_string()).collect()
}
