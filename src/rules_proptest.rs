//! Property-based tests for pattern and argument splitting.
//!
//! These tests use proptest to generate random inputs and verify that
//! invariants hold for all possible inputs.

#[cfg(test)]
mod proptest_tests {
    use crate::config::split_args;
    use crate::rules::{has_wildcard, split_pattern};
    use proptest::prelude::*;
    use std::path::PathBuf;

    // ============================================================================
    // split_pattern property tests
    // ============================================================================

    fn literal_segment() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_.-]{1,8}".prop_filter("not a dot segment", |s| s != "." && s != "..")
    }

    fn wildcard_segment() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("*".to_string()),
            Just("**".to_string()),
            "[a-z]{0,4}\\*\\.[a-z]{1,3}",
            "[a-z]{1,4}\\?",
        ]
    }

    proptest! {
        /// Property: a pattern without wildcards is all fixed prefix
        #[test]
        fn literal_pattern_has_empty_suffix(
            segments in prop::collection::vec(literal_segment(), 1..5)
        ) {
            let pattern = segments.join("/");
            let (fixed, suffix) = split_pattern(&pattern);
            prop_assert_eq!(fixed, PathBuf::from(&pattern));
            prop_assert!(suffix.is_empty());
        }

        /// Property: the prefix stops right before the first wildcard segment
        #[test]
        fn prefix_stops_at_first_wildcard(
            prefix in prop::collection::vec(literal_segment(), 0..4),
            wildcard in wildcard_segment(),
            rest in prop::collection::vec(
                prop_oneof![literal_segment(), wildcard_segment()],
                0..3
            )
        ) {
            let mut segments = prefix.clone();
            segments.push(wildcard.clone());
            segments.extend(rest.iter().cloned());
            let pattern = segments.join("/");

            let (fixed, suffix) = split_pattern(&pattern);

            prop_assert_eq!(fixed.clone(), prefix.iter().collect::<PathBuf>());
            prop_assert!(!has_wildcard(&fixed.to_string_lossy()));
            prop_assert!(suffix.starts_with(&wildcard));
            prop_assert_eq!(fixed.join(&suffix), PathBuf::from(&pattern));
        }
    }

    // ============================================================================
    // split_args property tests
    // ============================================================================

    proptest! {
        /// Property: space-joined plain words split back into the same words
        #[test]
        fn plain_words_round_trip(
            words in prop::collection::vec("[a-zA-Z0-9_=.:/-]{1,12}", 0..6)
        ) {
            let line = words.join(" ");
            prop_assert_eq!(split_args(&line).unwrap(), words);
        }

        /// Property: single-quoted arguments survive with their spaces intact
        #[test]
        fn single_quoted_arguments_round_trip(
            args in prop::collection::vec("[a-zA-Z0-9 \"\\\\=-]{0,12}", 0..5)
        ) {
            let line = args
                .iter()
                .map(|a| format!("'{}'", a))
                .collect::<Vec<_>>()
                .join("  ");
            prop_assert_eq!(split_args(&line).unwrap(), args);
        }

        /// Property: splitting never panics
        #[test]
        fn split_args_never_panics(line in ".*") {
            let _ = split_args(&line);
        }
    }
}
