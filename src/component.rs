//! Address component labels and parse results

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Semantic label of an address component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Label {
    /// Venue or building name
    House,
    HouseNumber,
    Street,
    /// Apartment, suite, floor
    Unit,
    PoBox,
    City,
    /// State, province or region
    State,
    PostalCode,
    Country,
}

impl Label {
    pub const ALL: [Label; 9] = [
        Label::House,
        Label::HouseNumber,
        Label::Street,
        Label::Unit,
        Label::PoBox,
        Label::City,
        Label::State,
        Label::PostalCode,
        Label::Country,
    ];

    /// Label name as exposed to callers (`house_number`, `postal_code`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            Label::House => "house",
            Label::HouseNumber => "house_number",
            Label::Street => "street",
            Label::Unit => "unit",
            Label::PoBox => "po_box",
            Label::City => "city",
            Label::State => "state",
            Label::PostalCode => "postal_code",
            Label::Country => "country",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Label {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::ALL
            .into_iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown label `{s}`"))
    }
}

/// A labeled slice of the input
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LabeledSpan {
    /// Exact input text of the span
    pub text: String,
    /// Normalized tokens of the span joined by spaces
    pub normalized: String,
    pub label: Label,
    /// 0.0 - 1.0
    pub confidence: f32,
    /// Byte offset of the span start in the input
    pub start: usize,
    /// Byte offset one past the span end
    pub end: usize,
}

/// Parser output with component accessors
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParsedAddress {
    /// Spans in input order, non-overlapping
    pub spans: Vec<LabeledSpan>,
}

impl ParsedAddress {
    pub fn new(spans: Vec<LabeledSpan>) -> Self {
        Self { spans }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// First span with `label`
    pub fn get(&self, label: Label) -> Option<&LabeledSpan> {
        self.spans.iter().find(|s| s.label == label)
    }

    /// Input text of the first span with `label`
    pub fn component(&self, label: Label) -> Option<&str> {
        self.get(label).map(|s| s.text.as_str())
    }

    pub fn house_number(&self) -> Option<&str> {
        self.component(Label::HouseNumber)
    }

    pub fn street(&self) -> Option<&str> {
        self.component(Label::Street)
    }

    pub fn city(&self) -> Option<&str> {
        self.component(Label::City)
    }

    pub fn postal_code(&self) -> Option<&str> {
        self.component(Label::PostalCode)
    }

    /// Whether a street-level address was found (house number and street)
    pub fn is_complete(&self) -> bool {
        self.get(Label::HouseNumber).is_some() && self.get(Label::Street).is_some()
    }

    /// `(component_text, label_name)` pairs in input order
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.spans
            .iter()
            .map(|s| (s.text.clone(), s.label.as_str().to_string()))
            .collect()
    }
}

impl From<Vec<LabeledSpan>> for ParsedAddress {
    fn from(spans: Vec<LabeledSpan>) -> Self {
        Self::new(spans)
    }
}
