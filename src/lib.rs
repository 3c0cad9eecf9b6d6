//! # addrnorm - address normalization, expansion, parsing and deduplication
//!
//! Turns free-form postal addresses into canonical forms that can be compared
//! across spelling variants.
//!
//! ## Features
//!
//! - Unicode-aware tokenizer that keeps byte spans into the input
//! - Normalization: case folding, per-language transliteration, diacritic
//!   stripping and dictionary lookup of abbreviations
//! - Expansion into every full-form variant (`St` -> `street` / `saint`)
//! - Component labeling (house number, street, unit, city, state, ...)
//! - Deduplication of address lists into groups of the same place
//! - Embedded English, French, German and Spanish tables; external tables
//!   can be loaded with [`Lexicon::from_dir`]
//!
//! ## Quick start
//!
//! ```rust
//! use addrnorm::Label;
//!
//! let parsed = addrnorm::parse_address("1600 Pennsylvania Avenue NW, Washington, DC 20500");
//! assert_eq!(parsed.house_number(), Some("1600"));
//! assert_eq!(parsed.component(Label::PostalCode), Some("20500"));
//!
//! let variants = addrnorm::expand_address("123 Main St Apt 4");
//! assert_eq!(variants[0], "123 main st apt 4");
//! assert!(variants.contains(&"123 main street apartment 4".to_string()));
//!
//! let groups = addrnorm::dedupe(&["123 Main Street Apt 4", "123 Main St. #4", "456 Oak Avenue"]);
//! assert_eq!(groups[0].members, vec![0, 1]);
//! assert_eq!(groups[1].members, vec![2]);
//! ```

mod component;
mod config;
mod data;
mod dedupe;
mod engine;
mod error;
mod expand;
mod language;
mod normalize;
mod parser;
mod token;
mod trie;

pub use component::{Label, LabeledSpan, ParsedAddress};
pub use config::{Options, DEFAULT_CITY_SIMILARITY, DEFAULT_MAX_EXPANSIONS};
pub use data::{DictionaryClass, DictionaryMatch, ExpansionRule, Lexicon, DICTIONARY_FILE};
pub use dedupe::{
    AddressRecord, ComponentKeys, DedupeGroup, DedupeReport, DuplicateStatus, Matcher, RuleMatcher,
};
pub use engine::Postal;
pub use error::{Error, Result};
pub use expand::expand;
pub use language::{HouseNumberPosition, Language};
pub use normalize::{
    fold, normalize as normalize_tokens, normalize_multi, NormalizedForm, NormalizedToken, Phrase,
    TokenRole,
};
pub use parser::parse;
pub use token::{tokenize, tokenize_bytes, Token, TokenKind};

/// Labels address components with the global engine.
///
/// Empty for input without any word or number.
///
/// ```rust
/// let parsed = addrnorm::parse_address("4 Rue de la Paix, 75002 Paris, France");
/// assert_eq!(parsed.street(), Some("Rue de la Paix"));
/// assert_eq!(parsed.city(), Some("Paris"));
/// assert!(addrnorm::parse_address("").is_empty());
/// ```
pub fn parse_address(address: &str) -> ParsedAddress {
    Postal::global().parse_address(address)
}

/// Expands an address into its full-form variants with the global engine.
///
/// The first variant is the canonical form.
///
/// ```rust
/// let variants = addrnorm::expand_address("PO Box 12");
/// assert_eq!(variants[0], "po box 12");
/// assert!(variants.contains(&"post office box 12".to_string()));
/// ```
pub fn expand_address(address: &str) -> Vec<String> {
    Postal::global().expand_address(address)
}

/// Groups addresses that denote the same place.
///
/// ```rust
/// let groups = addrnorm::dedupe(&["10 Oak Ave", "10 Oak Avenue", "12 Elm St"]);
/// assert_eq!(groups.len(), 2);
/// assert_eq!(groups[0].members, vec![0, 1]);
/// ```
pub fn dedupe(addresses: &[&str]) -> Vec<DedupeGroup> {
    Postal::global().dedupe(addresses)
}

/// Pairwise duplicate status of two addresses.
///
/// ```rust
/// use addrnorm::DuplicateStatus;
///
/// let status = addrnorm::duplicate_status("123 Main St, Springfield", "123 Main Street, Springfield, IL");
/// assert_eq!(status, DuplicateStatus::PossibleDuplicate);
/// ```
pub fn duplicate_status(a: &str, b: &str) -> DuplicateStatus {
    Postal::global().duplicate_status(a, b)
}

/// Canonical single-string form of an address.
///
/// ```rust
/// assert_eq!(addrnorm::normalize("123 Main St., Apt #4"), "123 main st apt # 4");
/// assert_eq!(addrnorm::normalize("Straße 5"), "strasse 5");
/// ```
pub fn normalize(address: &str) -> String {
    Postal::global().normalize(address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_address() {
        let parsed = parse_address("123 Main St Apt 4, San Francisco, CA 94102");
        assert_eq!(parsed.house_number(), Some("123"));
        assert_eq!(parsed.street(), Some("Main St"));
        assert_eq!(parsed.component(Label::Unit), Some("Apt 4"));
        assert_eq!(parsed.city(), Some("San Francisco"));
        assert_eq!(parsed.component(Label::State), Some("CA"));
        assert_eq!(parsed.postal_code(), Some("94102"));
    }

    #[test]
    fn test_identity_in_expansions() {
        for address in ["123 Main St Apt 4", "Calle Mayor 5, Madrid", "Hauptstraße 10"] {
            let variants = expand_address(address);
            assert_eq!(variants[0], normalize(address));
        }
    }

    #[test]
    fn test_empty_inputs() {
        assert!(parse_address("").is_empty());
        assert!(expand_address("   ").is_empty());
        assert!(dedupe(&[]).is_empty());
        assert_eq!(normalize("!!"), "");
    }

    #[test]
    fn test_global_dedupe() {
        let groups = dedupe(&["123 Main Street Apt 4", "123 Main St. #4", "456 Oak Avenue"]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[1].members, vec![2]);
    }
}
