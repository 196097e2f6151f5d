// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Edit distance with configurable, asymmetric costs.

use serde::Deserialize;

/// The cost of each edit operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EditCosts {
    /// The cost of deleting a character from the source.
    pub deletion: usize,

    /// The cost of inserting a character into the source.
    pub insertion: usize,

    /// The cost of replacing a character.
    pub replacement: usize,
}

impl EditCosts {
    /// Uniform costs, used for correcting typos.
    pub const TYPO: Self = Self::new(1, 1, 1);

    /// Costs used for searching module names by keyword: insertions are cheap, so a keyword that
    /// is a substring of a module name scores well.
    pub const SEARCH: Self = Self::new(8, 1, 5);

    /// Creates a new set of costs.
    pub const fn new(deletion: usize, insertion: usize, replacement: usize) -> Self {
        Self {
            deletion,
            insertion,
            replacement,
        }
    }
}

impl Default for EditCosts {
    fn default() -> Self {
        Self::TYPO
    }
}

/// Returns the cost of turning `source` into `target`.
pub fn distance(source: &str, target: &str, costs: EditCosts) -> usize {
    let source: Vec<char> = source.chars().collect();
    let target: Vec<char> = target.chars().collect();
    let cols = target.len() + 1;

    // Two rows of the table are enough.
    let mut prev: Vec<usize> = (0..cols).map(|c| c * costs.insertion).collect();
    let mut cur = vec![0; cols];

    for (r, source_char) in source.iter().enumerate() {
        cur[0] = (r + 1) * costs.deletion;
        for (c, target_char) in target.iter().enumerate() {
            let replace = if source_char == target_char {
                0
            } else {
                costs.replacement
            };
            cur[c + 1] = (prev[c + 1] + costs.deletion)
                .min(cur[c] + costs.insertion)
                .min(prev[c] + replace);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[cols - 1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use test_strategy::proptest;

    #[test_case("test1", "test2", EditCosts::TYPO, 1 ; "typo replacement")]
    #[test_case("tst", "test", EditCosts::SEARCH, 1 ; "search insertion")]
    #[test_case("test", "tst", EditCosts::SEARCH, 8 ; "search deletion")]
    #[test_case("", "abc", EditCosts::SEARCH, 3 ; "empty source")]
    #[test_case("abc", "", EditCosts::SEARCH, 24 ; "empty target")]
    #[test_case("kitten", "sitting", EditCosts::TYPO, 3 ; "classic")]
    #[test_case("hello", "hello", EditCosts::SEARCH, 0 ; "identical")]
    fn distances(source: &str, target: &str, costs: EditCosts, expected: usize) {
        assert_eq!(distance(source, target, costs), expected);
    }

    #[proptest]
    fn zero_iff_equal(#[strategy("[a-z_]{0,12}")] a: String, #[strategy("[a-z_]{0,12}")] b: String) {
        let d = distance(&a, &b, EditCosts::SEARCH);
        assert_eq!(d == 0, a == b);
    }

    #[proptest]
    fn typo_distance_is_symmetric_and_bounded(
        #[strategy("[a-z]{0,10}")] a: String,
        #[strategy("[a-z]{0,10}")] b: String,
    ) {
        let d = distance(&a, &b, EditCosts::TYPO);
        assert_eq!(d, distance(&b, &a, EditCosts::TYPO));
        assert!(d <= a.len().max(b.len()));
    }

    #[proptest]
    fn keyword_prefix_costs_only_insertions(
        #[strategy("[a-z]{1,8}")] keyword: String,
        #[strategy("[a-z]{0,8}")] suffix: String,
    ) {
        let module = format!("{keyword}{suffix}");
        assert_eq!(
            distance(&keyword, &module, EditCosts::SEARCH),
            suffix.len()
        );
    }
}
