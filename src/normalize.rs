//! Normalizer: case folding, diacritic handling and dictionary lookup.
//!
//! Produces a [`NormalizedForm`] consumed by both the parser and the
//! expansion engine. Lookup never picks a winner among ambiguous
//! abbreviations: `st` keeps both `street` and `saint`, and the expansion
//! engine enumerates them.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::data::{DictionaryClass, DictionaryMatch, Lexicon};
use crate::language::Language;
use crate::token::{scan, Token, TokenKind};

/// Role of a normalized token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TokenRole {
    Word,
    Numeric,
    /// Punctuation with meaning of its own (`#`, `&`)
    Symbol,
    /// Component boundary (`,`, `;`, `(` ...)
    Separator,
}

/// Punctuation that carries no information and is dropped (`St.` -> `st`)
fn is_ignorable(c: char) -> bool {
    matches!(
        c,
        '.' | '-' | '\'' | '"' | '`' | '\u{2019}' | '\u{2018}' | '\u{201C}' | '\u{201D}' | '\u{2010}'
            | '\u{2013}' | '\u{2014}'
    ) || is_combining_mark(c)
}

fn is_symbol(c: char) -> bool {
    matches!(c, '#' | '&' | '№')
}

/// Role of a token, or `None` when normalization drops it
fn role_of(token: &Token) -> Option<TokenRole> {
    match token.kind {
        TokenKind::Whitespace => None,
        TokenKind::Word => Some(TokenRole::Word),
        TokenKind::Numeric => Some(TokenRole::Numeric),
        TokenKind::Punct => {
            let c = token.text.chars().next()?;
            if is_ignorable(c) {
                None
            } else if is_symbol(c) {
                Some(TokenRole::Symbol)
            } else {
                Some(TokenRole::Separator)
            }
        }
    }
}

/// A token after folding, with its span in the original input
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizedToken {
    /// Folded text according to [`Options`]
    pub text: String,
    pub role: TokenRole,
    pub start: usize,
    pub end: usize,
    /// Lowercased, diacritic-free form used for dictionary lookup
    pub(crate) key: String,
}

impl NormalizedToken {
    pub fn is_content(&self) -> bool {
        matches!(self.role, TokenRole::Word | TokenRole::Numeric)
    }
}

/// A run of tokens `[start, end)` found in the dictionary
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Phrase {
    /// Index of the first token
    pub start: usize,
    /// Index one past the last token
    pub end: usize,
    pub matches: Vec<DictionaryMatch>,
}

impl Phrase {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn has_class(&self, class: DictionaryClass) -> bool {
        self.matches.iter().any(|m| m.class == class)
    }

    /// Union of every match's replacements, in table order, without the
    /// identity. May contain `""` when the phrase can be dropped.
    pub fn candidates(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for replacement in self.matches.iter().flat_map(|m| m.replacements.iter()) {
            if !out.contains(&replacement.as_str()) {
                out.push(replacement);
            }
        }
        out
    }
}

/// Normalized token sequence plus dictionary phrases
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NormalizedForm {
    pub tokens: Vec<NormalizedToken>,
    /// Non-overlapping, ordered by `start`
    pub phrases: Vec<Phrase>,
    /// Languages whose rules were applied, primary first
    pub languages: Vec<Language>,
}

impl NormalizedForm {
    pub fn is_empty(&self) -> bool {
        !self.tokens.iter().any(NormalizedToken::is_content)
    }

    /// Phrase starting at token `idx`
    pub fn phrase_at(&self, idx: usize) -> Option<&Phrase> {
        self.phrases
            .binary_search_by_key(&idx, |p| p.start)
            .ok()
            .map(|i| &self.phrases[i])
    }

    /// Single-string canonical form: non-separator tokens joined by one space
    pub fn canonical(&self) -> String {
        self.tokens
            .iter()
            .filter(|t| t.role != TokenRole::Separator)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Folds one token: case folding, then transliteration and diacritic stripping.
pub fn fold(text: &str, language: Language, options: &Options) -> String {
    let lowered = if options.lowercase {
        text.to_lowercase()
    } else {
        text.to_string()
    };
    if !options.strip_diacritics {
        return lowered;
    }

    let mut out = String::with_capacity(lowered.len());
    for c in lowered.nfc() {
        match language.transliterate(c) {
            Some(rep) => out.push_str(rep),
            None => out.extend(std::iter::once(c).nfd().filter(|ch| !is_combining_mark(*ch))),
        }
    }
    out
}

/// Lookup key for a dictionary pattern: its content and symbol tokens, folded
pub(crate) fn phrase_key(text: &str, language: Option<Language>, options: &Options) -> Vec<String> {
    let language = language.unwrap_or(Language::English);
    scan(text, None)
        .iter()
        .filter_map(|token| match role_of(token)? {
            TokenRole::Separator => None,
            _ => Some(fold(&token.text, language, options)),
        })
        .filter(|key| !key.is_empty())
        .collect()
}

/// Normalizes tokens for a single language
pub fn normalize(
    tokens: &[Token],
    language: Language,
    lexicon: &Lexicon,
    options: &Options,
) -> NormalizedForm {
    normalize_multi(tokens, &[language], lexicon, options)
}

/// Normalizes tokens against the rules of several languages.
///
/// The first language drives transliteration; an empty slice applies every
/// language's rules and folds with `options.default_language`.
pub fn normalize_multi(
    tokens: &[Token],
    languages: &[Language],
    lexicon: &Lexicon,
    options: &Options,
) -> NormalizedForm {
    let primary = languages
        .first()
        .copied()
        .unwrap_or(options.default_language);
    let key_options = Options::default();

    let mut normalized = Vec::with_capacity(tokens.len());
    for token in tokens {
        let Some(role) = role_of(token) else {
            continue;
        };
        let (text, key) = match role {
            TokenRole::Symbol | TokenRole::Separator => (token.text.clone(), token.text.clone()),
            TokenRole::Word | TokenRole::Numeric => (
                fold(&token.text, primary, options),
                fold(&token.text, primary, &key_options),
            ),
        };
        if text.is_empty() {
            continue;
        }
        normalized.push(NormalizedToken {
            text,
            role,
            start: token.start,
            end: token.end,
            key,
        });
    }

    let phrases = match_phrases(&normalized, languages, lexicon);
    log::trace!(
        "normalized {} tokens, {} dictionary phrases",
        normalized.len(),
        phrases.len()
    );

    NormalizedForm {
        tokens: normalized,
        phrases,
        languages: languages.to_vec(),
    }
}

/// Greedy longest-match phrase lookup within each separator-delimited run.
///
/// Words with no phrase of their own may still end in a street type
/// (`hauptstr`), which becomes a one-token phrase.
fn match_phrases(tokens: &[NormalizedToken], languages: &[Language], lexicon: &Lexicon) -> Vec<Phrase> {
    let mut phrases = Vec::new();
    let mut run_start = 0;

    while run_start < tokens.len() {
        let run_end = tokens[run_start..]
            .iter()
            .position(|t| t.role == TokenRole::Separator)
            .map_or(tokens.len(), |p| run_start + p);

        let keys: Vec<&str> = tokens[run_start..run_end]
            .iter()
            .map(|t| t.key.as_str())
            .collect();
        let mut k = 0;
        while k < keys.len() {
            match lexicon.lookup(&keys[k..], languages) {
                Some((len, matches)) => {
                    phrases.push(Phrase {
                        start: run_start + k,
                        end: run_start + k + len,
                        matches,
                    });
                    k += len;
                }
                None => {
                    let token = &tokens[run_start + k];
                    if token.role == TokenRole::Word {
                        if let Some(matches) = lexicon.compound_suffix(&token.key, languages) {
                            phrases.push(Phrase {
                                start: run_start + k,
                                end: run_start + k + 1,
                                matches,
                            });
                        }
                    }
                    k += 1;
                }
            }
        }

        run_start = run_end + 1;
    }

    phrases
}

/// Content and symbol keys, used for language detection
pub(crate) fn detection_keys(tokens: &[Token], options: &Options) -> Vec<String> {
    let key_options = Options::default();
    tokens
        .iter()
        .filter(|t| matches!(role_of(t), Some(TokenRole::Word | TokenRole::Numeric | TokenRole::Symbol)))
        .map(|t| fold(&t.text, options.default_language, &key_options))
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    fn form(text: &str, languages: &[Language]) -> NormalizedForm {
        let lexicon = Lexicon::embedded();
        let tokens = tokenize(text, languages.first().copied()).unwrap();
        normalize_multi(&tokens, languages, &lexicon, &Options::default())
    }

    fn texts(form: &NormalizedForm) -> Vec<&str> {
        form.tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_case_folding_and_punctuation() {
        let f = form("123 Main St., Apt #4", &[Language::English]);
        assert_eq!(texts(&f), vec!["123", "main", "st", ",", "apt", "#", "4"]);
        assert_eq!(f.tokens[3].role, TokenRole::Separator);
        assert_eq!(f.tokens[5].role, TokenRole::Symbol);
        assert_eq!(f.canonical(), "123 main st apt # 4");
    }

    #[test]
    fn test_spans_point_into_input() {
        let input = "12 Rue Émile Zola";
        let f = form(input, &[Language::French]);
        assert_eq!(&input[f.tokens[2].start..f.tokens[2].end], "Émile");
        assert_eq!(f.tokens[2].text, "emile");
    }

    #[test]
    fn test_diacritics_per_language() {
        let options = Options::default();
        assert_eq!(fold("Müller", Language::English, &options), "muller");
        assert_eq!(fold("Müller", Language::German, &options), "mueller");
        assert_eq!(fold("Straße", Language::English, &options), "strasse");
        assert_eq!(fold("Ñandú", Language::Spanish, &options), "nandu");
        // decomposed input folds like the precomposed one
        assert_eq!(fold("Mu\u{0308}ller", Language::German, &options), "mueller");

        let keep = Options::default().with_strip_diacritics(false);
        assert_eq!(fold("Müller", Language::English, &keep), "müller");
    }

    #[test]
    fn test_ambiguous_abbreviation_keeps_all_candidates() {
        let f = form("123 Main St", &[Language::English]);
        let phrase = f.phrase_at(2).expect("st is in the dictionary");
        let candidates = phrase.candidates();
        assert!(candidates.contains(&"street"));
        assert!(candidates.contains(&"saint"));
        assert!(phrase.has_class(DictionaryClass::StreetType));
        assert!(phrase.has_class(DictionaryClass::Qualifier));
    }

    #[test]
    fn test_phrases_do_not_cross_separators() {
        let f = form("PO, Box 12", &[Language::English]);
        assert!(f.phrases.iter().all(|p| p.len() == 1));

        let f = form("P.O. Box 12", &[Language::English]);
        let phrase = f.phrase_at(0).unwrap();
        assert_eq!(phrase.len(), 3);
        assert_eq!(phrase.candidates(), vec!["post office box"]);
    }

    #[test]
    fn test_german_compound_street_type() {
        let f = form("Hauptstr. 5", &[Language::German]);
        let phrase = f.phrase_at(0).expect("compound street type");
        assert_eq!(phrase.len(), 1);
        assert!(phrase.has_class(DictionaryClass::StreetType));
        assert_eq!(phrase.candidates(), vec!["hauptstrasse"]);

        let f = form("Hauptstraße 5", &[Language::German]);
        let phrase = f.phrase_at(0).unwrap();
        assert!(phrase.has_class(DictionaryClass::StreetType));
        assert!(phrase.candidates().is_empty());

        // short name parts and non-compounding languages are left alone
        assert!(form("Ring 5", &[Language::German]).phrase_at(0).unwrap().candidates().is_empty());
        assert!(form("Spring St", &[Language::German]).phrase_at(0).is_none());
        assert!(form("Hauptstr 5", &[Language::English]).phrase_at(0).is_none());
    }

    #[test]
    fn test_single_language_normalize() {
        let lexicon = Lexicon::embedded();
        let tokens = tokenize("4 Rue de la Paix", Some(Language::French)).unwrap();
        let f = normalize(&tokens, Language::French, &lexicon, &Options::default());
        assert_eq!(f.languages, vec![Language::French]);
        assert!(f.phrase_at(1).unwrap().has_class(DictionaryClass::StreetType));
        // `de` is an article in French, not Delaware
        assert!(!f.phrase_at(2).unwrap().has_class(DictionaryClass::State));
    }

    #[test]
    fn test_idempotent_on_canonical() {
        let lexicon = Lexicon::embedded();
        let options = Options::default();
        for input in ["123 Main St. Apt #4", "Straße 5, Zürich", "O'Farrell St", "94102-1234"] {
            let once = {
                let tokens = tokenize(input, None).unwrap();
                normalize_multi(&tokens, &[], &lexicon, &options).canonical()
            };
            let tokens = tokenize(&once, None).unwrap();
            let twice = normalize_multi(&tokens, &[], &lexicon, &options).canonical();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_phrase_key() {
        let options = Options::default();
        assert_eq!(phrase_key("P.O. Box", None, &options), vec!["p", "o", "box"]);
        assert_eq!(phrase_key("#", None, &options), vec!["#"]);
        assert!(phrase_key(" . ", None, &options).is_empty());
    }
}
