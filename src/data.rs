//! Rule table loading and dictionary index

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::language::Language;
use crate::normalize::phrase_key;
use crate::token::is_postal_code;
use crate::trie::Trie;

/// Embedded rule tables (included at compile time)
const DICTIONARY: &str = include_str!("../data/dictionary.csv");

/// File name looked up by [`Lexicon::from_dir`]
pub const DICTIONARY_FILE: &str = "dictionary.csv";

const HEADER: &str = "language,class,pattern,replacements";

/// Shortest name part accepted in front of a compound street type
const MIN_COMPOUND_STEM: usize = 3;

/// Shorter street types (`g`, `pl`) only match as words of their own
const MIN_COMPOUND_SUFFIX: usize = 3;

/// Semantic class of a dictionary phrase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DictionaryClass {
    /// Street suffix or prefix (`st`, `avenue`, `rue`, `strasse`)
    StreetType,
    /// Compass direction (`n`, `northwest`)
    Directional,
    /// Unit designator (`apt`, `suite`, `#`)
    UnitDesignator,
    /// Post office box (`po box`, `bp`, `postfach`)
    PoBox,
    /// Name qualifier (`saint`, `mount`, `fort`)
    Qualifier,
    /// Ordinal number (`1st`, `first`)
    Ordinal,
    /// State or province
    State,
    Country,
    /// Article or preposition (`de`, `la`, `the`)
    Article,
}

impl DictionaryClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DictionaryClass::StreetType => "street_type",
            DictionaryClass::Directional => "directional",
            DictionaryClass::UnitDesignator => "unit_designator",
            DictionaryClass::PoBox => "po_box",
            DictionaryClass::Qualifier => "qualifier",
            DictionaryClass::Ordinal => "ordinal",
            DictionaryClass::State => "state",
            DictionaryClass::Country => "country",
            DictionaryClass::Article => "article",
        }
    }
}

impl fmt::Display for DictionaryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DictionaryClass {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "street_type" => Ok(DictionaryClass::StreetType),
            "directional" => Ok(DictionaryClass::Directional),
            "unit_designator" => Ok(DictionaryClass::UnitDesignator),
            "po_box" => Ok(DictionaryClass::PoBox),
            "qualifier" => Ok(DictionaryClass::Qualifier),
            "ordinal" => Ok(DictionaryClass::Ordinal),
            "state" => Ok(DictionaryClass::State),
            "country" => Ok(DictionaryClass::Country),
            "article" => Ok(DictionaryClass::Article),
            other => Err(format!("unknown class `{other}`")),
        }
    }
}

/// One row of the rule table
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExpansionRule {
    /// Surface form, possibly several words (`p o box`)
    pub pattern: String,
    /// Full forms in table order; an empty string means the phrase may be dropped
    pub replacements: Vec<String>,
    /// `None` applies to every language
    pub language: Option<Language>,
    pub class: DictionaryClass,
}

impl ExpansionRule {
    pub fn new(
        pattern: impl Into<String>,
        replacements: impl IntoIterator<Item = impl Into<String>>,
        language: Option<Language>,
        class: DictionaryClass,
    ) -> Self {
        let mut unique: Vec<String> = Vec::new();
        for replacement in replacements {
            let replacement = replacement.into().trim().to_string();
            if !unique.contains(&replacement) {
                unique.push(replacement);
            }
        }
        Self {
            pattern: pattern.into(),
            replacements: unique,
            language,
            class,
        }
    }

    fn applies_to(&self, languages: &[Language]) -> bool {
        match self.language {
            None => true,
            Some(lang) => languages.is_empty() || languages.contains(&lang),
        }
    }
}

/// A dictionary hit attached to a phrase of the normalized input
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DictionaryMatch {
    pub class: DictionaryClass,
    pub language: Option<Language>,
    /// Empty when the phrase is already a canonical full form
    pub replacements: Vec<String>,
}

/// Index entry: which rule a phrase came from, and whether it is that
/// rule's pattern or one of its canonical replacements
#[derive(Debug, Clone, Copy)]
struct Entry {
    rule: usize,
    canonical: bool,
}

/// Street type written at the end of a compound word (`str` in `hauptstr`)
#[derive(Debug, Clone)]
struct Suffix {
    key: String,
    entry: Entry,
}

/// Process-wide immutable rule tables.
///
/// Built once (embedded or loaded from disk), then shared read-only by every
/// pipeline call, typically behind an `Arc`.
#[derive(Debug)]
pub struct Lexicon {
    rules: Vec<ExpansionRule>,
    phrases: Trie<Vec<Entry>>,
    /// Longest first
    suffixes: Vec<Suffix>,
}

impl Lexicon {
    /// Tables compiled into the crate
    pub fn embedded() -> Self {
        Self::from_csv(DICTIONARY, "<embedded>").expect("embedded dictionary is well-formed")
    }

    /// Loads `dictionary.csv` from `dir`
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_path(dir.as_ref().join(DICTIONARY_FILE))
    }

    /// Loads a dictionary file. The handle is released when this returns, on success or failure.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let file = File::open(path).map_err(|e| Error::data_load(&origin, e.to_string()))?;
        Self::from_reader(BufReader::new(file), &origin)
    }

    pub fn from_reader<R: BufRead>(reader: R, origin: &str) -> Result<Self> {
        let mut rules = Vec::new();
        let mut saw_header = false;

        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| Error::data_load(origin, e.to_string()))?;
            let lineno = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !saw_header {
                if line != HEADER {
                    return Err(Error::data_load(
                        origin,
                        format!("line {lineno}: expected header `{HEADER}`"),
                    ));
                }
                saw_header = true;
                continue;
            }
            let rule = parse_line(line)
                .map_err(|reason| Error::data_load(origin, format!("line {lineno}: {reason}")))?;
            rules.push(rule);
        }

        if rules.is_empty() {
            return Err(Error::data_load(origin, "no rules"));
        }

        let lexicon = Self::from_rules(rules);
        log::debug!(
            "loaded {} rules ({} phrases) from {}",
            lexicon.rules.len(),
            lexicon.phrases.len(),
            origin
        );
        Ok(lexicon)
    }

    pub fn from_csv(text: &str, origin: &str) -> Result<Self> {
        Self::from_reader(text.as_bytes(), origin)
    }

    /// Builds the phrase index. Rules whose pattern has no usable token are skipped.
    pub fn from_rules(rules: Vec<ExpansionRule>) -> Self {
        let key_options = Options::default();
        let mut phrases: Trie<Vec<Entry>> = Trie::new();
        let mut suffixes: Vec<Suffix> = Vec::new();

        for (idx, rule) in rules.iter().enumerate() {
            let key = phrase_key(&rule.pattern, rule.language, &key_options);
            if key.is_empty() {
                log::warn!("skipping rule with empty pattern `{}`", rule.pattern);
                continue;
            }
            let compound = rule.class == DictionaryClass::StreetType
                && rule.language.is_some_and(Language::compounds_street_types);

            let entry = Entry {
                rule: idx,
                canonical: false,
            };
            if compound {
                push_suffix(&mut suffixes, &key, entry, &rules);
            }
            phrases.entry(&key).push(entry);

            // Full forms carry the class too, so "street" is a street type
            for replacement in rule.replacements.iter().filter(|r| !r.is_empty()) {
                let key = phrase_key(replacement, rule.language, &key_options);
                if key.is_empty() {
                    continue;
                }
                let entry = Entry {
                    rule: idx,
                    canonical: true,
                };
                if compound {
                    push_suffix(&mut suffixes, &key, entry, &rules);
                }
                let entries = phrases.entry(&key);
                let known = entries.iter().any(|e| {
                    e.canonical
                        && rules[e.rule].class == rule.class
                        && rules[e.rule].language == rule.language
                });
                if !known {
                    entries.push(entry);
                }
            }
        }

        if phrases.is_empty() {
            log::warn!("dictionary index is empty: {} rules, no usable pattern", rules.len());
        }
        suffixes.sort_by(|a, b| b.key.len().cmp(&a.key.len()));

        Self {
            rules,
            phrases,
            suffixes,
        }
    }

    pub fn rules(&self) -> &[ExpansionRule] {
        &self.rules
    }

    /// Whether `phrase` is a pattern or full form of any rule
    pub fn contains(&self, phrase: &str) -> bool {
        let key = phrase_key(phrase, None, &Options::default());
        !key.is_empty() && self.phrases.get(&key).is_some_and(|entries| !entries.is_empty())
    }

    /// Longest dictionary phrase at the start of `words` that has a rule for
    /// one of `languages` (empty = any language).
    ///
    /// Returns (number of words matched, matches in table order).
    pub fn lookup<S: AsRef<str>>(
        &self,
        words: &[S],
        languages: &[Language],
    ) -> Option<(usize, Vec<DictionaryMatch>)> {
        self.phrases
            .find_prefixes(words)
            .into_iter()
            .rev()
            .find_map(|(entries, len)| {
                let matches: Vec<DictionaryMatch> = entries
                    .iter()
                    .filter(|e| self.rules[e.rule].applies_to(languages))
                    .map(|e| {
                        let rule = &self.rules[e.rule];
                        DictionaryMatch {
                            class: rule.class,
                            language: rule.language,
                            replacements: if e.canonical {
                                Vec::new()
                            } else {
                                rule.replacements.clone()
                            },
                        }
                    })
                    .collect();
                (!matches.is_empty()).then_some((len, matches))
            })
    }

    /// Street type ending the single word `word`, for languages that write
    /// street types as suffixes (`hauptstr` -> `hauptstrasse`).
    ///
    /// Replacements keep the name part: the match for `hauptstr` offers
    /// `hauptstrasse`, while an already spelled-out `hauptstrasse` matches
    /// with no replacements. `None` when no suffix leaves a name part of at
    /// least three characters.
    pub fn compound_suffix(&self, word: &str, languages: &[Language]) -> Option<Vec<DictionaryMatch>> {
        let (stem, key) = self.suffixes.iter().find_map(|s| {
            let stem = word.strip_suffix(s.key.as_str())?;
            (stem.chars().count() >= MIN_COMPOUND_STEM && self.rules[s.entry.rule].applies_to(languages))
                .then_some((stem, s.key.as_str()))
        })?;

        let matches = self
            .suffixes
            .iter()
            .filter(|s| s.key == key && self.rules[s.entry.rule].applies_to(languages))
            .map(|s| {
                let rule = &self.rules[s.entry.rule];
                let replacements = if s.entry.canonical {
                    Vec::new()
                } else {
                    rule.replacements
                        .iter()
                        .filter(|r| !r.is_empty())
                        .map(|r| format!("{stem}{r}"))
                        .collect()
                };
                DictionaryMatch {
                    class: rule.class,
                    language: rule.language,
                    replacements,
                }
            })
            .collect();
        Some(matches)
    }

    /// Languages with the most dictionary hits in `words`, ties in declaration order.
    ///
    /// State codes are two-letter and collide with common words (`de`, `la`),
    /// so on their own they do not count as evidence. A state code followed
    /// by a postal code (`CA 93101`) does, and outranks every other hit.
    /// Empty when nothing matched.
    pub fn detect_languages<S: AsRef<str>>(&self, words: &[S]) -> Vec<Language> {
        let mut scores: HashMap<Language, usize> = HashMap::new();
        let mut anchored: HashMap<Language, usize> = HashMap::new();
        let mut i = 0;

        while i < words.len() {
            let (len, hits): (usize, Vec<(DictionaryClass, Option<Language>)>) =
                match self.phrases.find_longest_prefix(&words[i..]) {
                    Some((entries, len)) => (
                        len,
                        entries
                            .iter()
                            .map(|e| (self.rules[e.rule].class, self.rules[e.rule].language))
                            .collect(),
                    ),
                    None => (
                        1,
                        self.compound_suffix(words[i].as_ref(), &[])
                            .unwrap_or_default()
                            .into_iter()
                            .map(|m| (m.class, m.language))
                            .collect(),
                    ),
                };

            let postal_follows = words.get(i + len).is_some_and(|w| is_postal_code(w.as_ref()));
            let mut word_hits = Vec::new();
            let mut state_hits = Vec::new();
            for (class, language) in hits {
                let Some(language) = language else {
                    continue;
                };
                if class != DictionaryClass::State {
                    word_hits.push(language);
                } else if postal_follows {
                    state_hits.push(language);
                }
            }
            tally(&mut scores, word_hits);
            tally(&mut anchored, state_hits);
            i += len;
        }

        let scores = if anchored.is_empty() { scores } else { anchored };
        let best = scores.values().copied().max().unwrap_or(0);
        if best == 0 {
            return Vec::new();
        }
        Language::ALL
            .into_iter()
            .filter(|lang| scores.get(lang) == Some(&best))
            .collect()
    }
}

/// Adds one point per distinct language
fn tally(scores: &mut HashMap<Language, usize>, mut hit: Vec<Language>) {
    hit.sort();
    hit.dedup();
    for lang in hit {
        *scores.entry(lang).or_default() += 1;
    }
}

fn push_suffix(suffixes: &mut Vec<Suffix>, key: &[String], entry: Entry, rules: &[ExpansionRule]) {
    let [key] = key else {
        return;
    };
    if key.chars().count() < MIN_COMPOUND_SUFFIX {
        return;
    }
    let rule = &rules[entry.rule];
    let known = suffixes.iter().any(|s| {
        s.key == *key
            && s.entry.canonical == entry.canonical
            && rules[s.entry.rule].class == rule.class
            && rules[s.entry.rule].language == rule.language
    });
    if !known {
        suffixes.push(Suffix {
            key: key.clone(),
            entry,
        });
    }
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::embedded()
    }
}

/// Parses `language,class,pattern,replacements`
fn parse_line(line: &str) -> std::result::Result<ExpansionRule, String> {
    let fields: Vec<&str> = line.splitn(4, ',').collect();
    if fields.len() != 4 {
        return Err(format!("expected 4 fields, found {}", fields.len()));
    }

    let language = match fields[0].trim() {
        "*" => None,
        code => Some(code.parse::<Language>()?),
    };
    let class = fields[1].parse::<DictionaryClass>()?;
    let pattern = fields[2].trim();
    if pattern.is_empty() {
        return Err("empty pattern".to_string());
    }

    let replacements: Vec<&str> = if fields[3].trim().is_empty() {
        Vec::new()
    } else {
        fields[3].split('|').collect()
    };

    Ok(ExpansionRule::new(pattern, replacements, language, class))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::embedded()
    }

    #[test]
    fn test_embedded_loads() {
        let lex = lexicon();
        assert!(lex.rules().len() > 300);
        assert!(lex
            .rules()
            .iter()
            .any(|r| r.pattern == "st" && r.class == DictionaryClass::StreetType));
    }

    #[test]
    fn test_parse_line() {
        let rule = parse_line("en,unit_designator,apt,apartment|").unwrap();
        assert_eq!(rule.language, Some(Language::English));
        assert_eq!(rule.class, DictionaryClass::UnitDesignator);
        assert_eq!(rule.replacements, vec!["apartment".to_string(), String::new()]);

        let rule = parse_line("*,country,france,").unwrap();
        assert_eq!(rule.language, None);
        assert!(rule.replacements.is_empty());

        assert!(parse_line("en,street_type").is_err());
        assert!(parse_line("xx,street_type,st,street").is_err());
        assert!(parse_line("en,bogus,st,street").is_err());
        assert!(parse_line("en,street_type, ,street").is_err());
    }

    #[test]
    fn test_ambiguous_lookup_keeps_all_matches() {
        let lex = lexicon();
        let (len, matches) = lex.lookup(&["st", "marks"], &[Language::English]).unwrap();
        assert_eq!(len, 1);
        let classes: Vec<DictionaryClass> = matches.iter().map(|m| m.class).collect();
        assert!(classes.contains(&DictionaryClass::StreetType));
        assert!(classes.contains(&DictionaryClass::Qualifier));
    }

    #[test]
    fn test_lookup_respects_languages() {
        let lex = lexicon();
        assert!(lex.lookup(&["rue"], &[Language::French]).is_some());
        assert!(lex.lookup(&["rue"], &[Language::English]).is_none());
        // language-independent rules always apply
        assert!(lex.lookup(&["france"], &[Language::English]).is_some());
    }

    #[test]
    fn test_multi_word_phrase() {
        let lex = lexicon();
        let (len, matches) = lex
            .lookup(&["p", "o", "box", "12"], &[Language::English])
            .unwrap();
        assert_eq!(len, 3);
        assert_eq!(matches[0].class, DictionaryClass::PoBox);
        assert_eq!(matches[0].replacements, vec!["post office box".to_string()]);
    }

    #[test]
    fn test_canonical_forms_are_indexed() {
        let lex = lexicon();
        let (_, matches) = lex.lookup(&["street"], &[Language::English]).unwrap();
        assert!(matches
            .iter()
            .any(|m| m.class == DictionaryClass::StreetType && m.replacements.is_empty()));

        let (len, matches) = lex.lookup(&["new", "york"], &[]).unwrap();
        assert_eq!(len, 2);
        assert_eq!(matches[0].class, DictionaryClass::State);
    }

    #[test]
    fn test_contains() {
        let lex = lexicon();
        assert!(lex.contains("St."));
        assert!(lex.contains("P.O. Box"));
        assert!(lex.contains("boulevard"));
        assert!(!lex.contains("springfield"));
        assert!(!lex.contains(" . "));
    }

    #[test]
    fn test_detect_languages() {
        let lex = lexicon();
        assert_eq!(
            lex.detect_languages(&["4", "rue", "de", "la", "paix"]),
            vec![Language::French]
        );
        assert_eq!(
            lex.detect_languages(&["1600", "pennsylvania", "avenue", "nw"]),
            vec![Language::English]
        );
        assert!(lex.detect_languages(&["zzz"]).is_empty());
    }

    #[test]
    fn test_state_before_postal_code_decides_language() {
        let lex = lexicon();
        let words = ["123", "de", "la", "vina", "st", "santa", "barbara", "ca", "93101"];
        assert_eq!(lex.detect_languages(&words), vec![Language::English]);

        // without the postal code, `ca` is no evidence
        let words = ["123", "de", "la", "vina", "st", "santa", "barbara", "ca"];
        assert!(!lex.detect_languages(&words).contains(&Language::English));
    }

    #[test]
    fn test_compound_suffix() {
        let lex = lexicon();
        let matches = lex.compound_suffix("hauptstr", &[Language::German]).unwrap();
        assert_eq!(matches[0].class, DictionaryClass::StreetType);
        assert_eq!(matches[0].language, Some(Language::German));
        assert_eq!(matches[0].replacements, vec!["hauptstrasse".to_string()]);

        let matches = lex.compound_suffix("lindenallee", &[]).unwrap();
        assert!(matches.iter().all(|m| m.replacements.is_empty()));

        assert!(lex.compound_suffix("hauptstr", &[Language::English]).is_none());
        assert!(lex.compound_suffix("weg", &[Language::German]).is_none());
        assert!(lex.compound_suffix("hamburg", &[Language::German]).is_none());
        assert_eq!(
            lex.detect_languages(&["hauptstr", "5", "10115", "berlin"]),
            vec![Language::German]
        );
    }

    #[test]
    fn test_from_rules_without_usable_patterns() {
        let lex = Lexicon::from_rules(vec![ExpansionRule::new(
            " . ",
            ["dot"],
            None,
            DictionaryClass::Article,
        )]);
        assert_eq!(lex.rules().len(), 1);
        assert!(!lex.contains("dot"));
        assert!(lex.lookup(&["dot"], &[]).is_none());
    }

    #[test]
    fn test_from_reader_errors() {
        let err = Lexicon::from_csv("", "mem").unwrap_err();
        assert!(matches!(err, Error::DataLoadError { .. }));

        let err = Lexicon::from_csv("bad header\nen,street_type,st,street\n", "mem").unwrap_err();
        assert!(err.to_string().contains("expected header"));

        let err = Lexicon::from_csv(
            "language,class,pattern,replacements\nen,street_type,st,street\nen,nope,x,y\n",
            "mem",
        )
        .unwrap_err();
        assert!(err.to_string().contains("line 3"));

        let err = Lexicon::from_csv("language,class,pattern,replacements\n", "mem").unwrap_err();
        assert!(err.to_string().contains("no rules"));
    }

    #[test]
    fn test_from_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DICTIONARY_FILE),
            "language,class,pattern,replacements\nen,street_type,st,street\n",
        )
        .unwrap();

        let lex = Lexicon::from_dir(dir.path()).unwrap();
        assert_eq!(lex.rules().len(), 1);

        let missing = tempfile::tempdir().unwrap();
        assert!(matches!(
            Lexicon::from_dir(missing.path()),
            Err(Error::DataLoadError { .. })
        ));
    }
}
