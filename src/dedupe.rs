//! Address deduplication.
//!
//! Every address becomes an [`AddressRecord`]: its expansion set, its parse
//! and a few component keys derived from the parse. A [`Matcher`] decides
//! whether two records denote the same place; matching pairs are merged with
//! a union-find so the result is a partition of the input.

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::component::{Label, LabeledSpan};
use crate::config::{Options, DEFAULT_CITY_SIMILARITY};
use crate::error::Error;
use crate::expand::{expand, expand_span};
use crate::normalize::NormalizedForm;
use crate::parser::parse;

/// How likely two addresses are to denote the same place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DuplicateStatus {
    NonDuplicate,
    /// Structural match that leans on components only one side has
    PossibleDuplicate,
    /// Structural match with every component agreeing
    LikelyDuplicate,
    /// The expansion sets share a string
    ExactDuplicate,
}

impl DuplicateStatus {
    pub fn is_duplicate(self) -> bool {
        self >= DuplicateStatus::PossibleDuplicate
    }
}

/// Component keys compared by [`RuleMatcher`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentKeys {
    pub house_number: Option<String>,
    /// Expansions of the street span
    pub street: HashSet<String>,
    /// Unit number without its designator (`apt 4` -> `4`)
    pub unit: Option<String>,
    /// Expansions of the city span (`st louis`, `saint louis`)
    pub city: HashSet<String>,
    /// Expansions of the state span (`ca`, `california`)
    pub state: HashSet<String>,
    /// First five characters of the postal code
    pub postal_code: Option<String>,
    pub country: HashSet<String>,
}

impl ComponentKeys {
    fn from_parse(form: &NormalizedForm, spans: &[LabeledSpan], options: &Options) -> Self {
        let first = |label: Label| spans.iter().find(|s| s.label == label);
        let variants = |label: Label| -> HashSet<String> {
            first(label)
                .map(|s| expand_span(form, s.start, s.end, options).into_iter().collect())
                .unwrap_or_default()
        };

        Self {
            house_number: first(Label::HouseNumber).map(|s| s.normalized.clone()),
            street: variants(Label::Street),
            unit: first(Label::Unit).and_then(|s| {
                s.normalized
                    .rsplit(' ')
                    .next()
                    .map(|n| n.trim_start_matches('#').to_string())
                    .filter(|n| !n.is_empty())
            }),
            city: variants(Label::City),
            state: variants(Label::State),
            postal_code: first(Label::PostalCode).map(|s| s.normalized.chars().take(5).collect()),
            country: variants(Label::Country),
        }
    }
}

/// One address prepared for matching
#[derive(Debug, Clone, PartialEq)]
pub struct AddressRecord {
    pub raw: String,
    pub expansions: HashSet<String>,
    pub parsed: Vec<LabeledSpan>,
    pub keys: ComponentKeys,
}

impl AddressRecord {
    /// Builds a record from `raw` and its normalized form
    pub fn build(raw: &str, form: &NormalizedForm, options: &Options) -> Self {
        let parsed = parse(form, raw);
        let keys = ComponentKeys::from_parse(form, &parsed, options);
        Self {
            raw: raw.to_string(),
            expansions: expand(form, options).into_iter().collect(),
            parsed,
            keys,
        }
    }
}

/// Pairwise duplicate predicate
pub trait Matcher: Send + Sync {
    fn status(&self, a: &AddressRecord, b: &AddressRecord) -> DuplicateStatus;

    fn is_match(&self, a: &AddressRecord, b: &AddressRecord) -> bool {
        self.status(a, b).is_duplicate()
    }
}

/// Outcome of comparing one optional component
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Agree,
    BothMissing,
    /// Present on one side only
    OneMissing,
    Conflict,
}

fn compare_values(a: Option<&str>, b: Option<&str>, same: impl Fn(&str, &str) -> bool) -> Field {
    match (a, b) {
        (None, None) => Field::BothMissing,
        (Some(_), None) | (None, Some(_)) => Field::OneMissing,
        (Some(a), Some(b)) if same(a, b) => Field::Agree,
        _ => Field::Conflict,
    }
}

fn compare_sets(a: &HashSet<String>, b: &HashSet<String>) -> Field {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => Field::BothMissing,
        (true, false) | (false, true) => Field::OneMissing,
        _ if !a.is_disjoint(b) => Field::Agree,
        _ => Field::Conflict,
    }
}

/// Rule-based matcher.
///
/// Exact when expansion sets intersect; otherwise house numbers must be equal
/// and street expansions must intersect, and the remaining components must
/// not conflict. Cities agree when their expansions intersect or when any two
/// of them are Jaro-Winkler similar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleMatcher {
    pub city_similarity: f64,
}

impl RuleMatcher {
    pub fn new(options: &Options) -> Self {
        Self {
            city_similarity: options.city_similarity,
        }
    }

    fn same_city(&self, a: &str, b: &str) -> bool {
        a == b || strsim::jaro_winkler(a, b) >= self.city_similarity
    }

    fn compare_cities(&self, a: &HashSet<String>, b: &HashSet<String>) -> Field {
        match compare_sets(a, b) {
            Field::Conflict if a.iter().any(|x| b.iter().any(|y| self.same_city(x, y))) => Field::Agree,
            field => field,
        }
    }
}

impl Default for RuleMatcher {
    fn default() -> Self {
        Self {
            city_similarity: DEFAULT_CITY_SIMILARITY,
        }
    }
}

impl Matcher for RuleMatcher {
    fn status(&self, a: &AddressRecord, b: &AddressRecord) -> DuplicateStatus {
        if !a.expansions.is_disjoint(&b.expansions) {
            return DuplicateStatus::ExactDuplicate;
        }

        let (ka, kb) = (&a.keys, &b.keys);
        let house = compare_values(ka.house_number.as_deref(), kb.house_number.as_deref(), |x, y| x == y);
        if house != Field::Agree || compare_sets(&ka.street, &kb.street) != Field::Agree {
            return DuplicateStatus::NonDuplicate;
        }

        let fields = [
            compare_values(ka.unit.as_deref(), kb.unit.as_deref(), |x, y| x == y),
            self.compare_cities(&ka.city, &kb.city),
            compare_sets(&ka.state, &kb.state),
            compare_values(ka.postal_code.as_deref(), kb.postal_code.as_deref(), |x, y| x == y),
            compare_sets(&ka.country, &kb.country),
        ];

        if fields.contains(&Field::Conflict) {
            DuplicateStatus::NonDuplicate
        } else if fields.contains(&Field::OneMissing) {
            DuplicateStatus::PossibleDuplicate
        } else {
            DuplicateStatus::LikelyDuplicate
        }
    }
}

/// Indices of addresses judged to be the same place
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DedupeGroup {
    /// Ascending
    pub members: Vec<usize>,
}

impl DedupeGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, index: usize) -> bool {
        self.members.binary_search(&index).is_ok()
    }
}

/// Result of deduplicating raw byte inputs
#[derive(Debug, Default)]
pub struct DedupeReport {
    /// Partition of the accepted inputs
    pub groups: Vec<DedupeGroup>,
    /// Inputs excluded from grouping, with the reason
    pub rejected: Vec<(usize, Error)>,
}

/// Union-find over `0..n`
#[derive(Debug)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        let mut root = x;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        while self.parent[x] != root {
            let next = self.parent[x];
            self.parent[x] = root;
            x = next;
        }
        root
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        match self.rank[ra].cmp(&self.rank[rb]) {
            std::cmp::Ordering::Less => self.parent[ra] = rb,
            std::cmp::Ordering::Greater => self.parent[rb] = ra,
            std::cmp::Ordering::Equal => {
                self.parent[rb] = ra;
                self.rank[ra] += 1;
            }
        }
    }
}

/// Partitions `records` into groups of duplicates.
///
/// Pairs are evaluated in parallel; merging runs afterwards on one thread.
/// Members are positions in `records`, groups are ordered by their smallest
/// member.
pub fn group(records: &[AddressRecord], matcher: &dyn Matcher) -> Vec<DedupeGroup> {
    let n = records.len();
    let pairs: Vec<(usize, usize)> = (0..n)
        .into_par_iter()
        .flat_map_iter(|i| {
            (i + 1..n)
                .filter(move |&j| matcher.is_match(&records[i], &records[j]))
                .map(move |j| (i, j))
        })
        .collect();

    let mut set = DisjointSet::new(n);
    for &(a, b) in &pairs {
        set.union(a, b);
    }

    // roots keyed by smallest member keep the output ordered
    let mut by_root: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..n {
        by_root.entry(set.find(i)).or_default().push(i);
    }
    let mut groups: Vec<DedupeGroup> = by_root
        .into_values()
        .map(|members| DedupeGroup { members })
        .collect();
    groups.sort_by_key(|g| g.members[0]);

    log::debug!(
        "dedupe: {} records, {} matching pairs, {} groups",
        n,
        pairs.len(),
        groups.len()
    );
    groups
}
