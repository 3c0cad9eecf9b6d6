//! Address labeler.
//!
//! A deterministic rule cascade run as a tagged-state scanner: items (a
//! dictionary phrase or a single token) are visited left to right, each
//! transition looks at the item's role, its dictionary classes and the
//! current state, and every word or numeric token ends up with a label.
//! Separators close the open span. Malformed input degrades to
//! low-confidence labels rather than failing.

use crate::component::{Label, LabeledSpan};
use crate::data::DictionaryClass;
use crate::normalize::{NormalizedForm, Phrase, TokenRole};
use crate::token::is_postal_code;

/// Scan unit
#[derive(Debug)]
struct Item<'a> {
    /// First token index
    first: usize,
    /// Last token index (inclusive)
    last: usize,
    role: TokenRole,
    /// Normalized text
    text: String,
    phrase: Option<&'a Phrase>,
    /// Index of the separator-delimited component
    component: usize,
}

impl Item<'_> {
    fn has(&self, class: DictionaryClass) -> bool {
        self.phrase.is_some_and(|p| p.has_class(class))
    }

    fn is_content(&self) -> bool {
        matches!(self.role, TokenRole::Word | TokenRole::Numeric)
    }

    fn is_postal_like(&self) -> bool {
        self.role == TokenRole::Numeric && is_postal_code(&self.text)
    }

    /// `5th`, `1st`
    fn is_ordinal_like(&self) -> bool {
        self.has(DictionaryClass::Ordinal)
            || (self.role == TokenRole::Numeric && self.text.chars().any(char::is_alphabetic))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Start,
    House,
    HouseNumber,
    Street { suffixed: bool },
    Unit { has_number: bool },
    PoBox { has_number: bool },
    City,
    Region,
    PostalCode,
    Country,
}

struct Scanner<'a> {
    items: Vec<Item<'a>>,
    state: ScanState,
    /// Component in which the current state was entered
    state_component: usize,
    seen_house_number: bool,
    seen_street: bool,
    seen_po_box: bool,
    /// Leading component that names a venue
    house_component: Option<usize>,
    labels: Vec<Option<(Label, f32)>>,
}

impl<'a> Scanner<'a> {
    fn new(form: &'a NormalizedForm) -> Self {
        let items = build_items(form);
        let house_component = find_house_component(&items);
        let labels = vec![None; items.len()];
        Self {
            items,
            state: ScanState::Start,
            state_component: 0,
            seen_house_number: false,
            seen_street: false,
            seen_po_box: false,
            house_component,
            labels,
        }
    }

    fn next_content(&self, i: usize) -> Option<usize> {
        (i + 1..self.items.len()).find(|&j| self.items[j].is_content())
    }

    fn has_content_before(&self, i: usize) -> bool {
        self.items[..i].iter().any(Item::is_content)
    }

    /// Everything after `i` is a postal code (or nothing)
    fn is_tail(&self, i: usize) -> bool {
        self.items[i + 1..]
            .iter()
            .filter(|it| it.is_content())
            .all(Item::is_postal_like)
    }

    /// A region name is followed by a postal code, a trailing country, or nothing
    fn in_region_position(&self, i: usize) -> bool {
        match self.next_content(i) {
            None => true,
            Some(j) => {
                let next = &self.items[j];
                next.is_postal_like() || (next.has(DictionaryClass::Country) && self.is_tail(j))
            }
        }
    }

    fn run(&mut self) {
        for i in 0..self.items.len() {
            let decision = match self.items[i].role {
                TokenRole::Separator => None,
                TokenRole::Numeric => Some(self.numeric(i)),
                TokenRole::Symbol => self.symbol(i),
                TokenRole::Word => Some(self.word(i)),
            };

            if let Some((label, confidence, state)) = decision {
                self.labels[i] = Some((label, confidence));
                self.state = state;
                self.state_component = self.items[i].component;
                match label {
                    Label::HouseNumber => self.seen_house_number = true,
                    Label::Street => self.seen_street = true,
                    Label::PoBox => self.seen_po_box = true,
                    _ => {}
                }
            }
        }
    }

    fn numeric(&self, i: usize) -> (Label, f32, ScanState) {
        let item = &self.items[i];
        let same_component = item.component == self.state_component;
        let next = self.next_content(i).map(|j| &self.items[j]);
        let next_word_here =
            next.is_some_and(|n| n.component == item.component && n.role == TokenRole::Word);
        let last_in_component = next.map_or(true, |n| n.component != item.component);

        match self.state {
            ScanState::Unit { has_number: false } if same_component => {
                return (Label::Unit, 0.9, ScanState::Unit { has_number: true })
            }
            ScanState::PoBox { has_number: false } => {
                return (Label::PoBox, 0.9, ScanState::PoBox { has_number: true })
            }
            _ => {}
        }

        if item.is_postal_like()
            && !matches!(self.state, ScanState::Start | ScanState::House)
            && (self.seen_street || self.seen_po_box || item.component > self.state_component)
        {
            return (Label::PostalCode, 0.85, ScanState::PostalCode);
        }

        if !self.seen_house_number
            && !self.seen_street
            && matches!(self.state, ScanState::Start | ScanState::House)
        {
            return (Label::HouseNumber, 0.9, ScanState::HouseNumber);
        }

        match self.state {
            ScanState::HouseNumber if same_component => {
                if item.text.contains('/') {
                    (Label::HouseNumber, 0.7, ScanState::HouseNumber)
                } else if next_word_here || item.is_ordinal_like() {
                    (Label::Street, 0.7, ScanState::Street { suffixed: false })
                } else {
                    (Label::Unit, 0.4, ScanState::Unit { has_number: true })
                }
            }
            ScanState::Street { suffixed } if same_component => {
                if !self.seen_house_number && last_in_component {
                    // Hauptstrasse 5
                    (Label::HouseNumber, 0.7, ScanState::HouseNumber)
                } else if !suffixed && (next_word_here || item.is_ordinal_like()) {
                    (Label::Street, 0.7, ScanState::Street { suffixed: false })
                } else {
                    (Label::Unit, 0.6, ScanState::Unit { has_number: true })
                }
            }
            ScanState::Unit { .. }
                if same_component && !self.seen_house_number && !self.seen_street && next_word_here =>
            {
                (Label::HouseNumber, 0.6, ScanState::HouseNumber)
            }
            ScanState::Unit { .. } if same_component => {
                (Label::Unit, 0.5, ScanState::Unit { has_number: true })
            }
            _ if item.is_postal_like() => (Label::PostalCode, 0.6, ScanState::PostalCode),
            _ if !self.seen_house_number => (Label::HouseNumber, 0.5, ScanState::HouseNumber),
            _ => (Label::Unit, 0.3, ScanState::Unit { has_number: true }),
        }
    }

    fn symbol(&self, i: usize) -> Option<(Label, f32, ScanState)> {
        let item = &self.items[i];
        let same_component = item.component == self.state_component;

        if item.has(DictionaryClass::UnitDesignator) {
            let confidence = if self.seen_street || self.seen_house_number {
                0.85
            } else {
                0.6
            };
            return Some((Label::Unit, confidence, ScanState::Unit { has_number: false }));
        }

        match self.state {
            ScanState::Street { suffixed } if same_component => {
                Some((Label::Street, 0.5, ScanState::Street { suffixed }))
            }
            ScanState::City if same_component => Some((Label::City, 0.4, ScanState::City)),
            ScanState::House if same_component => Some((Label::House, 0.4, ScanState::House)),
            _ => None,
        }
    }

    fn word(&self, i: usize) -> (Label, f32, ScanState) {
        let item = &self.items[i];
        let same_component = item.component == self.state_component;
        let next = self.next_content(i).map(|j| &self.items[j]);
        let next_here = next.is_some_and(|n| n.component == item.component);
        let number_next_here = next_here && next.is_some_and(|n| n.role == TokenRole::Numeric);

        if item.has(DictionaryClass::PoBox) {
            return (Label::PoBox, 0.9, ScanState::PoBox { has_number: false });
        }

        if item.has(DictionaryClass::Country) && self.has_content_before(i) && self.is_tail(i) {
            return (Label::Country, 0.9, ScanState::Country);
        }

        if item.has(DictionaryClass::UnitDesignator) && !matches!(self.state, ScanState::Unit { .. }) {
            if (self.seen_street || self.seen_house_number) && next_here {
                return (Label::Unit, 0.85, ScanState::Unit { has_number: false });
            }
            // Apt 4 123 Main St
            if number_next_here {
                return (Label::Unit, 0.6, ScanState::Unit { has_number: false });
            }
        }

        if self.state == (ScanState::Unit { has_number: false })
            && same_component
            && item.text.chars().count() <= 3
        {
            // Apt B
            return (Label::Unit, 0.7, ScanState::Unit { has_number: true });
        }

        if item.has(DictionaryClass::State)
            && self.has_content_before(i)
            && self.in_region_position(i)
        {
            return (Label::State, 0.85, ScanState::Region);
        }

        let street_word = item.has(DictionaryClass::StreetType);
        match self.state {
            ScanState::Start => {
                if self.house_component == Some(item.component) {
                    (Label::House, 0.6, ScanState::House)
                } else {
                    let confidence = if street_word { 0.7 } else { 0.6 };
                    (Label::Street, confidence, ScanState::Street { suffixed: false })
                }
            }
            ScanState::House if same_component => (Label::House, 0.6, ScanState::House),
            ScanState::House => (Label::Street, 0.6, ScanState::Street { suffixed: false }),
            ScanState::HouseNumber => {
                let confidence = if street_word || item.has(DictionaryClass::Directional) {
                    0.85
                } else {
                    0.8
                };
                (Label::Street, confidence, ScanState::Street { suffixed: false })
            }
            ScanState::Street { suffixed: false } if same_component => {
                if street_word {
                    (Label::Street, 0.85, ScanState::Street { suffixed: true })
                } else {
                    (Label::Street, 0.75, ScanState::Street { suffixed: false })
                }
            }
            ScanState::Street { suffixed: true } if same_component => {
                if item.has(DictionaryClass::Directional) {
                    (Label::Street, 0.8, ScanState::Street { suffixed: true })
                } else if street_word {
                    (Label::Street, 0.6, ScanState::Street { suffixed: true })
                } else {
                    (Label::City, 0.5, ScanState::City)
                }
            }
            ScanState::Street { .. } => (Label::City, 0.7, ScanState::City),
            ScanState::Unit { .. } | ScanState::PoBox { .. } => (Label::City, 0.6, ScanState::City),
            ScanState::City if same_component => (Label::City, 0.6, ScanState::City),
            ScanState::City => (Label::City, 0.5, ScanState::City),
            ScanState::PostalCode => (Label::City, 0.7, ScanState::City),
            ScanState::Region if item.has(DictionaryClass::Country) => {
                (Label::Country, 0.8, ScanState::Country)
            }
            ScanState::Region => (Label::City, 0.4, ScanState::City),
            ScanState::Country => (Label::City, 0.3, ScanState::City),
        }
    }
}

/// Groups tokens into scan items: a dictionary phrase, or one token
fn build_items(form: &NormalizedForm) -> Vec<Item<'_>> {
    let mut items = Vec::new();
    let mut component = 0;
    let mut i = 0;

    while i < form.tokens.len() {
        let token = &form.tokens[i];
        if token.role == TokenRole::Separator {
            items.push(Item {
                first: i,
                last: i,
                role: TokenRole::Separator,
                text: token.text.clone(),
                phrase: None,
                component,
            });
            component += 1;
            i += 1;
            continue;
        }

        let phrase = form.phrase_at(i);
        let end = phrase.map_or(i + 1, |p| p.end);
        let role = if end - i > 1 { TokenRole::Word } else { token.role };
        let text = form.tokens[i..end]
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        items.push(Item {
            first: i,
            last: end - 1,
            role,
            text,
            phrase,
            component,
        });
        i = end;
    }

    items
}

/// First component is a venue name when it has no numbers or street words
/// and a later component starts with a house number followed by more content.
fn find_house_component(items: &[Item<'_>]) -> Option<usize> {
    let content: Vec<&Item<'_>> = items.iter().filter(|it| it.is_content()).collect();
    let first = content.first()?.component;
    let plain = content
        .iter()
        .take_while(|it| it.component == first)
        .all(|it| {
            it.role == TokenRole::Word
                && !it.has(DictionaryClass::StreetType)
                && !it.has(DictionaryClass::PoBox)
        });
    if !plain {
        return None;
    }

    let later_number = content.windows(3).any(|w| {
        w[1].component > first
            && w[1].component != w[0].component
            && w[1].role == TokenRole::Numeric
            && w[2].component == w[1].component
    });
    later_number.then_some(first)
}

/// Labels a normalized address.
///
/// `input` must be the text the form was normalized from; span texts are
/// slices of it. Every word and numeric token is covered by exactly one
/// span, spans are non-overlapping and in input order.
pub fn parse(form: &NormalizedForm, input: &str) -> Vec<LabeledSpan> {
    let mut scanner = Scanner::new(form);
    scanner.run();
    merge_spans(form, &scanner.items, &scanner.labels, input)
}

/// Merges consecutive items with the same label in the same component
fn merge_spans(
    form: &NormalizedForm,
    items: &[Item<'_>],
    labels: &[Option<(Label, f32)>],
    input: &str,
) -> Vec<LabeledSpan> {
    struct Open {
        label: Label,
        component: usize,
        first: usize,
        last: usize,
        confidence: f32,
    }

    let mut spans = Vec::new();
    let mut open: Option<Open> = None;

    let flush = |open: Open, spans: &mut Vec<LabeledSpan>| {
        let start = form.tokens[open.first].start;
        let end = form.tokens[open.last].end;
        let normalized = form.tokens[open.first..=open.last]
            .iter()
            .filter(|t| t.role != TokenRole::Separator)
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        spans.push(LabeledSpan {
            text: input.get(start..end).unwrap_or_default().to_string(),
            normalized,
            label: open.label,
            confidence: open.confidence,
            start,
            end,
        });
    };

    for (item, label) in items.iter().zip(labels) {
        if item.role == TokenRole::Separator {
            if let Some(o) = open.take() {
                flush(o, &mut spans);
            }
            continue;
        }
        let Some((label, confidence)) = *label else {
            continue;
        };

        match open.as_mut() {
            Some(o) if o.label == label && o.component == item.component => {
                o.last = item.last;
                o.confidence = o.confidence.min(confidence);
            }
            _ => {
                if let Some(o) = open.take() {
                    flush(o, &mut spans);
                }
                open = Some(Open {
                    label,
                    component: item.component,
                    first: item.first,
                    last: item.last,
                    confidence,
                });
            }
        }
    }
    if let Some(o) = open.take() {
        flush(o, &mut spans);
    }

    spans
}
