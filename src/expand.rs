//! Expansion engine: enumerates full-form variants of a normalized address

use std::borrow::Cow;
use std::collections::HashSet;

use crate::config::Options;
use crate::language::HouseNumberPosition;
use crate::normalize::{NormalizedForm, Phrase, TokenRole};

/// One slot of the output: a dictionary phrase or a plain token.
///
/// `candidates[0]` is always the identity; `""` drops the slot.
#[derive(Debug)]
struct Segment<'a> {
    candidates: Vec<Cow<'a, str>>,
    numeric: bool,
}

impl<'a> Segment<'a> {
    fn new(identity: Cow<'a, str>, replacements: Vec<&'a str>, numeric: bool) -> Self {
        let mut candidates = vec![identity];
        for replacement in replacements {
            if !candidates.iter().any(|c| c == replacement) {
                candidates.push(Cow::Borrowed(replacement));
            }
        }
        Self { candidates, numeric }
    }
}

/// Splits the form into segments, returning them and the number of
/// segments in the first component (before the first separator).
fn segments(form: &NormalizedForm) -> (Vec<Segment<'_>>, usize) {
    let mut segments = Vec::new();
    let mut first_component = None;
    let mut i = 0;

    while i < form.tokens.len() {
        let token = &form.tokens[i];
        if token.role == TokenRole::Separator {
            first_component.get_or_insert(segments.len());
            i += 1;
            continue;
        }

        match form.phrase_at(i) {
            Some(phrase) => {
                let identity = if phrase.len() == 1 {
                    Cow::Borrowed(token.text.as_str())
                } else {
                    Cow::Owned(
                        form.tokens[phrase.start..phrase.end]
                            .iter()
                            .map(|t| t.text.as_str())
                            .collect::<Vec<_>>()
                            .join(" "),
                    )
                };
                let numeric = phrase.len() == 1 && token.role == TokenRole::Numeric;
                segments.push(Segment::new(identity, phrase.candidates(), numeric));
                i = phrase.end;
            }
            None => {
                segments.push(Segment::new(
                    Cow::Borrowed(token.text.as_str()),
                    Vec::new(),
                    token.role == TokenRole::Numeric,
                ));
                i += 1;
            }
        }
    }

    let first = first_component.unwrap_or(segments.len());
    (segments, first)
}

/// Segment orderings to enumerate, original order first.
///
/// The first component may be reordered to the house-number convention of
/// another selected language: `5 hauptstrasse` <-> `hauptstrasse 5`.
fn orderings(segments: &[Segment<'_>], first_component: usize, form: &NormalizedForm) -> Vec<Vec<usize>> {
    let n = segments.len();
    let mut orders = vec![(0..n).collect::<Vec<_>>()];

    let k = first_component;
    if k < 2 {
        return orders;
    }
    let wants = |pos: HouseNumberPosition| {
        form.languages
            .iter()
            .any(|l| l.house_number_position() == pos)
    };

    if segments[0].numeric
        && !segments[1..k].iter().any(|s| s.numeric)
        && wants(HouseNumberPosition::AfterStreet)
    {
        let mut order: Vec<usize> = (1..k).collect();
        order.push(0);
        order.extend(k..n);
        orders.push(order);
    }
    if segments[k - 1].numeric
        && !segments[..k - 1].iter().any(|s| s.numeric)
        && wants(HouseNumberPosition::BeforeStreet)
    {
        let mut order = vec![k - 1];
        order.extend(0..k - 1);
        order.extend(k..n);
        orders.push(order);
    }

    orders
}

/// Enumerates expansions of `form`.
///
/// The cartesian product of every segment's candidates, identity first, so
/// the first string is always the canonical form. Variants come in order of
/// how many segments they rewrite: the identity, then every single rewrite
/// left to right, then every pair, and so on. A truncated result therefore
/// still holds rewrites of every segment. The result is deduplicated,
/// deterministic for identical input and tables, and holds at most
/// `options.max_expansions` strings.
pub fn expand(form: &NormalizedForm, options: &Options) -> Vec<String> {
    if form.is_empty() {
        return Vec::new();
    }

    let (segments, first_component) = segments(form);
    let max = options.max_expansions.max(1);
    let max_attempts = max.saturating_mul(8).max(64);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    let mut attempts = 0usize;
    let mut truncated = false;

    'orders: for order in orderings(&segments, first_component, form) {
        let radices: Vec<usize> = order
            .iter()
            .map(|&s| segments[s].candidates.len())
            .collect();
        let open: Vec<usize> = (0..order.len()).filter(|&p| radices[p] > 1).collect();

        for rewrites in 0..=open.len() {
            let mut picked: Vec<usize> = (0..rewrites).collect();
            loop {
                let slots: Vec<usize> = picked.iter().map(|&p| open[p]).collect();
                let mut choice = vec![0usize; order.len()];
                for &slot in &slots {
                    choice[slot] = 1;
                }

                loop {
                    if out.len() >= max || attempts >= max_attempts {
                        truncated = true;
                        break 'orders;
                    }
                    attempts += 1;

                    let variant = order
                        .iter()
                        .zip(&choice)
                        .map(|(&s, &c)| segments[s].candidates[c].as_ref())
                        .filter(|c| !c.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ");
                    if !variant.is_empty() && seen.insert(variant.clone()) {
                        out.push(variant);
                    }

                    if !next_rewrite(&mut choice, &slots, &radices) {
                        break;
                    }
                }

                if !next_combination(&mut picked, open.len()) {
                    break;
                }
            }
        }
    }

    if truncated {
        log::warn!(
            "expansions of `{}` truncated at {} variants",
            form.canonical(),
            out.len()
        );
    }
    out
}

/// Steps the rewritten slots through their non-identity candidates,
/// rightmost slot fastest. False once every combination was visited.
fn next_rewrite(choice: &mut [usize], slots: &[usize], radices: &[usize]) -> bool {
    for &slot in slots.iter().rev() {
        choice[slot] += 1;
        if choice[slot] < radices[slot] {
            return true;
        }
        choice[slot] = 1;
    }
    false
}

/// Next `picked.len()`-subset of `0..n` in lexicographic order
fn next_combination(picked: &mut [usize], n: usize) -> bool {
    let k = picked.len();
    for i in (0..k).rev() {
        if picked[i] < n - k + i {
            picked[i] += 1;
            for j in i + 1..k {
                picked[j] = picked[j - 1] + 1;
            }
            return true;
        }
    }
    false
}

/// Expansions of the tokens lying inside the byte range `[start, end)`
pub(crate) fn expand_span(form: &NormalizedForm, start: usize, end: usize, options: &Options) -> Vec<String> {
    let Some(first) = form.tokens.iter().position(|t| t.start >= start) else {
        return Vec::new();
    };
    let last = form
        .tokens
        .iter()
        .rposition(|t| t.end <= end)
        .map_or(first, |i| i + 1);
    if last <= first {
        return Vec::new();
    }

    let sub = NormalizedForm {
        tokens: form.tokens[first..last].to_vec(),
        phrases: form
            .phrases
            .iter()
            .filter(|p| p.start >= first && p.end <= last)
            .map(|p| Phrase {
                start: p.start - first,
                end: p.end - first,
                matches: p.matches.clone(),
            })
            .collect(),
        languages: form.languages.clone(),
    };
    expand(&sub, options)
}
