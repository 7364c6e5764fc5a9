//! Property-based tests for path normalization.
//!
//! These tests use proptest to generate random path specs and verify that
//! the canonical form is stable and never escapes its root.

#[cfg(test)]
mod proptest_tests {
    use crate::path::{normalize_relative, spec_matches};
    use proptest::prelude::*;

    fn component() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9_-][a-zA-Z0-9_.-]{0,7}".prop_filter("not a dot component", |c| {
            c != "." && c != ".."
        })
    }

    fn noisy_separator() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("/"), Just("//"), Just("/./"), Just("\\")]
    }

    proptest! {
        /// Property: normalizing twice gives the same result as normalizing once
        #[test]
        fn normalize_is_idempotent(parts in prop::collection::vec(component(), 1..6)) {
            let once = normalize_relative(&parts.join("/")).unwrap();
            let twice = normalize_relative(&once).unwrap();
            prop_assert_eq!(once, twice);
        }

        /// Property: separator noise collapses to the canonical form
        #[test]
        fn normalize_collapses_separator_noise(
            parts in prop::collection::vec(component(), 1..6),
            sep in noisy_separator(),
            leading_dot in any::<bool>(),
        ) {
            let mut noisy = parts.join(sep);
            if leading_dot {
                noisy = format!("./{}", noisy);
            }
            let canonical = parts.join("/");
            prop_assert_eq!(normalize_relative(&noisy).unwrap(), canonical);
        }

        /// Property: canonical output never contains dot components or empty parts
        #[test]
        fn normalized_output_is_clean(parts in prop::collection::vec(component(), 1..6)) {
            let normalized = normalize_relative(&parts.join("//")).unwrap();
            for part in normalized.split('/') {
                prop_assert!(!part.is_empty());
                prop_assert_ne!(part, ".");
                prop_assert_ne!(part, "..");
            }
            prop_assert!(!normalized.starts_with('/'));
        }

        /// Property: any `..` component is rejected
        #[test]
        fn parent_components_are_rejected(
            before in prop::collection::vec(component(), 0..3),
            after in prop::collection::vec(component(), 0..3),
        ) {
            let mut parts = before.clone();
            parts.push("..".to_string());
            parts.extend(after);
            prop_assert!(normalize_relative(&parts.join("/")).is_err());
        }

        /// Property: a literal spec matches exactly itself
        #[test]
        fn literal_spec_matches_itself(parts in prop::collection::vec(component(), 1..5)) {
            let spec = parts.join("/");
            prop_assert!(spec_matches(&spec, &spec).unwrap());
        }
    }
}
