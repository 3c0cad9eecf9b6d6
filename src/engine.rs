//! Pipeline facade

use std::path::Path;
use std::sync::Arc;

use once_cell::sync::Lazy;
use rayon::prelude::*;

use crate::component::ParsedAddress;
use crate::config::Options;
use crate::data::Lexicon;
use crate::dedupe::{self, AddressRecord, DedupeGroup, DedupeReport, DuplicateStatus, Matcher, RuleMatcher};
use crate::error::{Error, Result};
use crate::expand::expand;
use crate::language::Language;
use crate::normalize::{detection_keys, normalize_multi, NormalizedForm};
use crate::parser::parse;
use crate::token::{tokenize, Token};

/// Global engine over the embedded tables and default options
static GLOBAL_POSTAL: Lazy<Postal> = Lazy::new(Postal::new);

/// Address engine.
///
/// Owns the options and a shared handle to the dictionary tables. Cloning is
/// cheap and every method takes `&self`, so one instance serves any number
/// of threads.
#[derive(Debug, Clone)]
pub struct Postal {
    lexicon: Arc<Lexicon>,
    options: Options,
}

impl Postal {
    /// Engine over the embedded dictionary with default options
    pub fn new() -> Self {
        Self::with_lexicon(Lexicon::embedded(), Options::default())
    }

    /// Engine over the embedded dictionary
    pub fn with_options(options: Options) -> Self {
        Self::with_lexicon(Lexicon::embedded(), options)
    }

    pub fn with_lexicon(lexicon: impl Into<Arc<Lexicon>>, options: Options) -> Self {
        Self {
            lexicon: lexicon.into(),
            options,
        }
    }

    /// Loads `dictionary.csv` from `dir`
    pub fn from_dir(dir: impl AsRef<Path>, options: Options) -> Result<Self> {
        let lexicon = Lexicon::from_dir(dir)?;
        Ok(Self::with_lexicon(lexicon, options))
    }

    /// Shared instance used by the crate-level functions
    pub fn global() -> &'static Postal {
        &GLOBAL_POSTAL
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    fn language_hint(&self) -> Option<Language> {
        self.options.languages.first().copied()
    }

    pub fn tokenize(&self, text: &str) -> Result<Vec<Token>> {
        tokenize(text, self.language_hint())
    }

    /// Configured languages, or the ones detected in `tokens`
    pub fn languages_for(&self, tokens: &[Token]) -> Vec<Language> {
        if !self.options.languages.is_empty() {
            return self.options.languages.clone();
        }
        let keys = detection_keys(tokens, &self.options);
        let detected = self.lexicon.detect_languages(&keys);
        if detected.is_empty() {
            vec![self.options.default_language]
        } else {
            detected
        }
    }

    /// Tokenizes and normalizes `text`.
    ///
    /// Fails with [`Error::UnparsableInput`] when `text` has no word or
    /// numeric token.
    pub fn normalize_form(&self, text: &str) -> Result<NormalizedForm> {
        let hint = self.language_hint();
        let tokens = tokenize(text, hint)?;
        let languages = self.languages_for(&tokens);

        // elision (l'avenue) is split only once the language is known
        let primary = languages[0];
        let tokens = if primary.splits_elision() && hint != Some(primary) {
            tokenize(text, Some(primary))?
        } else {
            tokens
        };

        log::trace!("`{}`: languages {:?}", text, languages);
        Ok(normalize_multi(&tokens, &languages, &self.lexicon, &self.options))
    }

    /// Canonical single-string form, empty for unparsable input
    pub fn normalize(&self, text: &str) -> String {
        self.normalize_form(text)
            .map(|form| form.canonical())
            .unwrap_or_default()
    }

    /// Labels the components of `text`
    ///
    /// ```rust
    /// use addrnorm::{Label, Postal};
    ///
    /// let postal = Postal::new();
    /// let parsed = postal.parse_address("123 Main St Apt 4, San Francisco, CA 94102");
    /// assert_eq!(parsed.house_number(), Some("123"));
    /// assert_eq!(parsed.component(Label::State), Some("CA"));
    /// ```
    pub fn parse_address(&self, text: &str) -> ParsedAddress {
        match self.normalize_form(text) {
            Ok(form) => ParsedAddress::new(parse(&form, text)),
            Err(_) => ParsedAddress::default(),
        }
    }

    /// Parses every address in parallel, preserving order
    pub fn parse_batch(&self, addresses: &[&str]) -> Vec<ParsedAddress> {
        addresses.par_iter().map(|a| self.parse_address(a)).collect()
    }

    /// Full-form variants of `text`, the canonical form first
    pub fn expand_address(&self, text: &str) -> Vec<String> {
        match self.normalize_form(text) {
            Ok(form) => expand(&form, &self.options),
            Err(_) => Vec::new(),
        }
    }

    pub fn expand_batch(&self, addresses: &[&str]) -> Vec<Vec<String>> {
        addresses.par_iter().map(|a| self.expand_address(a)).collect()
    }

    /// Prepares `text` for matching; unparsable input yields an empty record
    pub fn record(&self, text: &str) -> AddressRecord {
        let form = self.normalize_form(text).unwrap_or_default();
        AddressRecord::build(text, &form, &self.options)
    }

    pub fn duplicate_status(&self, a: &str, b: &str) -> DuplicateStatus {
        let matcher = RuleMatcher::new(&self.options);
        matcher.status(&self.record(a), &self.record(b))
    }

    /// Groups addresses that denote the same place
    pub fn dedupe(&self, addresses: &[&str]) -> Vec<DedupeGroup> {
        self.dedupe_with(addresses, &RuleMatcher::new(&self.options))
    }

    /// Like [`Postal::dedupe`] with a custom predicate
    pub fn dedupe_with(&self, addresses: &[&str], matcher: &dyn Matcher) -> Vec<DedupeGroup> {
        let records: Vec<AddressRecord> = addresses.par_iter().map(|a| self.record(a)).collect();
        dedupe::group(&records, matcher)
    }

    /// Groups raw inputs; entries that are not valid UTF-8 are reported and skipped
    pub fn dedupe_bytes(&self, inputs: &[&[u8]]) -> DedupeReport {
        let decoded: Vec<std::result::Result<AddressRecord, Error>> = inputs
            .par_iter()
            .map(|bytes| {
                let text = std::str::from_utf8(bytes)?;
                Ok(self.record(text))
            })
            .collect();

        let mut accepted = Vec::new();
        let mut records = Vec::new();
        let mut rejected = Vec::new();
        for (index, result) in decoded.into_iter().enumerate() {
            match result {
                Ok(record) => {
                    accepted.push(index);
                    records.push(record);
                }
                Err(e) => {
                    log::warn!("dedupe: input {} rejected: {}", index, e);
                    rejected.push((index, e));
                }
            }
        }

        let groups = dedupe::group(&records, &RuleMatcher::new(&self.options))
            .into_iter()
            .map(|g| DedupeGroup {
                members: g.members.into_iter().map(|pos| accepted[pos]).collect(),
            })
            .collect();

        DedupeReport { groups, rejected }
    }
}

impl Default for Postal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Label;
    use std::fs;
    use tempfile::tempdir;

    fn postal() -> Postal {
        Postal::new()
    }

    #[test]
    fn test_detects_language() {
        let p = postal();
        let tokens = p.tokenize("4 Rue de la Paix, Paris").unwrap();
        assert_eq!(p.languages_for(&tokens), vec![Language::French]);

        let tokens = p.tokenize("Zzz Qqq").unwrap();
        assert_eq!(p.languages_for(&tokens), vec![Language::English]);
    }

    #[test]
    fn test_configured_languages_win() {
        let p = Postal::with_options(Options::default().with_languages([Language::Spanish]));
        let tokens = p.tokenize("123 Main St").unwrap();
        assert_eq!(p.languages_for(&tokens), vec![Language::Spanish]);
    }

    #[test]
    fn test_elision_split_after_detection() {
        let p = postal();
        let form = p.normalize_form("12 rue de l'Église, Paris").unwrap();
        assert_eq!(form.languages[0], Language::French);
        assert!(form.tokens.iter().any(|t| t.text == "eglise"));
    }

    #[test]
    fn test_unparsable_input() {
        let p = postal();
        assert!(matches!(p.normalize_form("  ,, "), Err(Error::UnparsableInput)));
        assert!(p.parse_address("").is_empty());
        assert!(p.expand_address("...").is_empty());
        assert_eq!(p.normalize(""), "");
    }

    #[test]
    fn test_normalize() {
        let p = postal();
        assert_eq!(p.normalize("123 Main St., Apt #4"), "123 main st apt # 4");
    }

    #[test]
    fn test_batches_preserve_order() {
        let p = postal();
        let inputs = ["123 Main St", "", "456 Oak Ave"];
        let parsed = p.parse_batch(&inputs);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[0].house_number(), Some("123"));
        assert!(parsed[1].is_empty());
        assert_eq!(parsed[2].house_number(), Some("456"));

        let expanded = p.expand_batch(&inputs);
        assert_eq!(expanded[0][0], "123 main st");
        assert!(expanded[1].is_empty());
        assert_eq!(expanded[2][0], "456 oak ave");
    }

    #[test]
    fn test_dedupe() {
        let p = postal();
        let groups = p.dedupe(&["123 Main Street Apt 4", "123 Main St. #4", "456 Oak Avenue"]);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].members, vec![0, 1]);
        assert_eq!(groups[1].members, vec![2]);
    }

    #[test]
    fn test_dedupe_bytes_rejects_invalid_utf8() {
        let p = postal();
        let inputs: [&[u8]; 4] = [
            b"123 Main Street Apt 4",
            &[0xff, 0xfe, 0x00],
            b"456 Oak Avenue",
            b"123 Main St. #4",
        ];
        let report = p.dedupe_bytes(&inputs);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0, 1);
        assert!(matches!(report.rejected[0].1, Error::InvalidEncoding(_)));
        let members: Vec<Vec<usize>> = report.groups.into_iter().map(|g| g.members).collect();
        assert_eq!(members, vec![vec![0, 3], vec![2]]);
    }

    #[test]
    fn test_duplicate_status() {
        let p = postal();
        assert_eq!(
            p.duplicate_status("123 Main Street Apt 4", "123 Main St. #4"),
            DuplicateStatus::ExactDuplicate
        );
        assert_eq!(
            p.duplicate_status("123 Main St", "456 Oak Ave"),
            DuplicateStatus::NonDuplicate
        );
    }

    #[test]
    fn test_abbreviated_cities_are_duplicates() {
        let p = postal();
        for (a, b) in [
            ("123 Main St Apt 4, St Louis", "123 Main Street #4, Saint Louis, MO"),
            ("123 Main St Apt 4, Ft Worth", "123 Main Street #4, Fort Worth, TX"),
            ("123 Main St Apt 4, Mt Vernon", "123 Main Street #4, Mount Vernon, NY"),
        ] {
            assert!(p.duplicate_status(a, b).is_duplicate(), "{a} / {b}");
        }
    }

    #[test]
    fn test_state_and_postal_code_select_english() {
        let p = postal();
        let input = "123 De La Vina St, Santa Barbara, CA 93101";
        let tokens = p.tokenize(input).unwrap();
        assert_eq!(p.languages_for(&tokens), vec![Language::English]);

        let parsed = p.parse_address(input);
        assert_eq!(parsed.house_number(), Some("123"));
        assert_eq!(parsed.component(Label::State), Some("CA"));
        assert_eq!(parsed.postal_code(), Some("93101"));

        let variants = p.expand_address(input);
        assert!(variants.iter().any(|v| v.contains("vina street")));
        assert!(!variants.iter().any(|v| v.starts_with("de la vina st 123")));
    }

    #[test]
    fn test_german_compound_street_types() {
        let p = postal();
        let form = p.normalize_form("Hauptstr. 5, 10115 Berlin").unwrap();
        assert_eq!(form.languages, vec![Language::German]);
        assert_eq!(
            p.duplicate_status("Hauptstr. 5, 10115 Berlin", "Hauptstraße 5, 10115 Berlin"),
            DuplicateStatus::ExactDuplicate
        );
        assert!(p
            .expand_address("Lindenstr. 12")
            .contains(&"lindenstrasse 12".to_string()));
    }

    #[test]
    fn test_from_dir() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(crate::data::DICTIONARY_FILE),
            "language,class,pattern,replacements\nen,street_type,rd,road\n",
        )
        .unwrap();
        let p = Postal::from_dir(dir.path(), Options::default()).unwrap();
        let out = p.expand_address("12 Mill Rd");
        assert_eq!(out, vec!["12 mill rd".to_string(), "12 mill road".to_string()]);

        let parsed = p.parse_address("12 Mill Rd");
        assert_eq!(parsed.component(Label::Street), Some("Mill Rd"));
    }

    #[test]
    fn test_global_shared() {
        assert!(std::ptr::eq(Postal::global(), Postal::global()));
    }
}
