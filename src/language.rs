//! Supported languages and their per-language conventions

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Where a language conventionally writes the house number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HouseNumberPosition {
    /// `123 Main Street`, `4 rue de la Paix`
    BeforeStreet,
    /// `Hauptstrasse 5`, `Calle Mayor 5`
    AfterStreet,
}

/// Language tag for rule tables and normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Language {
    /// English
    English,
    /// French
    French,
    /// German
    German,
    /// Spanish
    Spanish,
}

impl Language {
    /// All supported languages, in declaration order
    pub const ALL: [Language; 4] = [
        Language::English,
        Language::French,
        Language::German,
        Language::Spanish,
    ];

    /// ISO 639-1 code
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::French => "fr",
            Language::German => "de",
            Language::Spanish => "es",
        }
    }

    pub fn house_number_position(self) -> HouseNumberPosition {
        match self {
            Language::English | Language::French => HouseNumberPosition::BeforeStreet,
            Language::German | Language::Spanish => HouseNumberPosition::AfterStreet,
        }
    }

    /// Whether a single letter followed by an apostrophe is an elided article (`l'avenue`)
    pub fn splits_elision(self) -> bool {
        matches!(self, Language::French | Language::Spanish)
    }

    /// Whether street types are written as a suffix of the name (`Hauptstr.`, `Lindenallee`)
    pub fn compounds_street_types(self) -> bool {
        matches!(self, Language::German)
    }

    /// Language-specific transliteration applied before combining marks are stripped.
    ///
    /// Returns `None` when the character has no special treatment.
    pub fn transliterate(self, c: char) -> Option<&'static str> {
        match (self, c) {
            (Language::German, 'ä') => Some("ae"),
            (Language::German, 'ö') => Some("oe"),
            (Language::German, 'ü') => Some("ue"),
            (_, 'ß') => Some("ss"),
            (_, 'æ') => Some("ae"),
            (_, 'œ') => Some("oe"),
            (_, 'ø') => Some("o"),
            (_, 'ł') => Some("l"),
            (_, 'đ') => Some("d"),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" | "english" => Ok(Language::English),
            "fr" | "french" => Ok(Language::French),
            "de" | "german" => Ok(Language::German),
            "es" | "spanish" => Ok(Language::Spanish),
            other => Err(format!("unknown language `{other}`")),
        }
    }
}
