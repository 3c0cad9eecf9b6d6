//! Pipeline options

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Default cap on the number of expansions returned for one address
pub const DEFAULT_MAX_EXPANSIONS: usize = 256;

/// Default Jaro-Winkler threshold above which two city names are compatible
pub const DEFAULT_CITY_SIMILARITY: f64 = 0.92;

/// Options shared by every pipeline stage.
///
/// Built once and passed by reference; nothing in the pipeline mutates it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Options {
    /// Languages whose rules apply. Empty means "detect from the input".
    pub languages: Vec<Language>,
    /// Used when detection finds no dictionary hit
    pub default_language: Language,
    /// Case-fold tokens
    pub lowercase: bool,
    /// Strip diacritics (after language-specific transliteration)
    pub strip_diacritics: bool,
    /// Upper bound on expansions per address
    pub max_expansions: usize,
    /// Jaro-Winkler similarity at which two city names count as the same
    pub city_similarity: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            languages: Vec::new(),
            default_language: Language::English,
            lowercase: true,
            strip_diacritics: true,
            max_expansions: DEFAULT_MAX_EXPANSIONS,
            city_similarity: DEFAULT_CITY_SIMILARITY,
        }
    }
}

impl Options {
    pub fn with_languages(mut self, languages: impl IntoIterator<Item = Language>) -> Self {
        self.languages = languages.into_iter().collect();
        self
    }

    pub fn with_default_language(mut self, language: Language) -> Self {
        self.default_language = language;
        self
    }

    pub fn with_lowercase(mut self, lowercase: bool) -> Self {
        self.lowercase = lowercase;
        self
    }

    pub fn with_strip_diacritics(mut self, strip: bool) -> Self {
        self.strip_diacritics = strip;
        self
    }

    /// Sets the expansion cap; values below 1 are raised to 1 so the identity form survives.
    pub fn with_max_expansions(mut self, max: usize) -> Self {
        self.max_expansions = max.max(1);
        self
    }

    pub fn with_city_similarity(mut self, threshold: f64) -> Self {
        self.city_similarity = threshold.clamp(0.0, 1.0);
        self
    }
}
