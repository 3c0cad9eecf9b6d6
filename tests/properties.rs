//! Property-based tests for the address pipeline
//!
//! Random address-like strings must never panic and must keep the
//! structural guarantees of every stage.

use std::collections::HashSet;

use addrnorm::{Postal, TokenRole};
use proptest::prelude::*;

/// Address-like text: letters, digits, a few accented letters and the
/// punctuation addresses actually use
fn address_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.#éèüößñ-]{0,40}"
}

/// Realistic fragments glued together
fn structured_strategy() -> impl Strategy<Value = String> {
    let number = prop::sample::select(vec!["1", "12", "123", "1600", "221b", "5th"]);
    let name = prop::sample::select(vec!["Main", "Oak", "Pennsylvania", "Paix", "Mayor", "Haupt"]);
    let kind = prop::sample::select(vec!["St", "Street", "Ave", "Rue", "Calle", "Str.", "Blvd", ""]);
    let tail = prop::sample::select(vec![
        "",
        ", Springfield",
        ", San Francisco, CA 94102",
        " Apt 4",
        " #4",
        ", 75002 Paris, France",
    ]);
    (number, name, kind, tail).prop_map(|(n, s, k, t)| format!("{n} {s} {k}{t}"))
}

fn address_pool() -> Vec<&'static str> {
    vec![
        "123 Main Street Apt 4",
        "123 Main St. #4",
        "456 Oak Avenue",
        "456 Oak Ave",
        "123 Main St, Springfield",
        "PO Box 12",
        "P.O. Box 12",
        "",
        "4 Rue de la Paix, Paris",
    ]
}

proptest! {
    #[test]
    fn test_normalize_is_idempotent(input in address_strategy()) {
        let postal = Postal::global();
        let once = postal.normalize(&input);
        let twice = postal.normalize(&once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn test_identity_is_first_expansion(input in address_strategy()) {
        let postal = Postal::global();
        let expansions = postal.expand_address(&input);
        let canonical = postal.normalize(&input);
        if canonical.is_empty() {
            prop_assert!(expansions.is_empty());
        } else {
            prop_assert_eq!(&expansions[0], &canonical);
        }
    }

    #[test]
    fn test_expansions_are_unique_and_capped(input in structured_strategy()) {
        let postal = Postal::global();
        let expansions = postal.expand_address(&input);
        let unique: HashSet<&String> = expansions.iter().collect();
        prop_assert_eq!(unique.len(), expansions.len());
        prop_assert!(expansions.len() <= postal.options().max_expansions);
    }

    #[test]
    fn test_expansion_is_deterministic(input in structured_strategy()) {
        let postal = Postal::global();
        prop_assert_eq!(postal.expand_address(&input), postal.expand_address(&input));
    }

    #[test]
    fn test_parser_spans_ordered_and_covering(input in prop_oneof![address_strategy(), structured_strategy()]) {
        let postal = Postal::global();
        let parsed = postal.parse_address(&input);

        for span in &parsed.spans {
            prop_assert!(span.start < span.end);
            prop_assert_eq!(&input[span.start..span.end], span.text.as_str());
            prop_assert!((0.0..=1.0).contains(&span.confidence));
        }
        for pair in parsed.spans.windows(2) {
            prop_assert!(pair[0].end <= pair[1].start);
        }

        if let Ok(form) = postal.normalize_form(&input) {
            for token in form.tokens.iter().filter(|t| matches!(t.role, TokenRole::Word | TokenRole::Numeric)) {
                prop_assert!(
                    parsed.spans.iter().any(|s| s.start <= token.start && token.end <= s.end),
                    "token {:?} of {:?} is not labeled",
                    token.text,
                    input
                );
            }
        } else {
            prop_assert!(parsed.is_empty());
        }
    }

    #[test]
    fn test_dedupe_partitions_input(
        addresses in prop::collection::vec(prop::sample::select(address_pool()), 0..8)
    ) {
        let groups = Postal::global().dedupe(&addresses);

        let mut seen = Vec::new();
        for group in &groups {
            prop_assert!(!group.members.is_empty());
            prop_assert!(group.members.windows(2).all(|w| w[0] < w[1]));
            seen.extend(group.members.iter().copied());
        }
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..addresses.len()).collect::<Vec<_>>());

        prop_assert!(groups.windows(2).all(|w| w[0].members[0] < w[1].members[0]));
    }

    #[test]
    fn test_identical_addresses_share_a_group(address in prop::sample::select(address_pool())) {
        prop_assume!(!address.is_empty());
        let groups = Postal::global().dedupe(&[address, address]);
        prop_assert_eq!(groups.len(), 1);
    }
}
