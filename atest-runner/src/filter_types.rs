// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Detection of wildcard and regular filters combined for the same module.
//!
//! Tradefed can't apply a wildcard filter and an exact filter to the same module in a single
//! invocation, so such combinations must be rejected before anything is built.

use crate::test_info::TestInfo;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};

static WILDCARD_FILTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*[?|*]$").expect("wildcard filter regex is valid"));
static REGULAR_FILTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*\w$").expect("regular filter regex is valid"));

/// The shape of a Tradefed filter string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FilterType {
    /// The filter ends in a wildcard.
    Wildcard,

    /// The filter ends in a word character.
    Regular,
}

/// Returns the shapes found among `tf_filters`.
pub fn get_filter_types<'a>(tf_filters: impl IntoIterator<Item = &'a str>) -> BTreeSet<FilterType> {
    let mut types = BTreeSet::new();
    for tf_filter in tf_filters {
        if WILDCARD_FILTER_RE.is_match(tf_filter) {
            types.insert(FilterType::Wildcard);
        }
        if REGULAR_FILTER_RE.is_match(tf_filter) {
            types.insert(FilterType::Regular);
        }
    }
    types
}

/// Returns the modules whose filters, merged across every test with the same name, have more
/// than one shape.
pub fn mixed_type_filter_modules<'a>(
    test_infos: impl IntoIterator<Item = &'a TestInfo>,
) -> Vec<String> {
    let mut module_types: BTreeMap<&str, BTreeSet<FilterType>> = BTreeMap::new();
    for info in test_infos {
        let tf_filters: Vec<String> = info
            .data
            .filters
            .iter()
            .flat_map(|filter| filter.to_tf_strings())
            .collect();
        module_types
            .entry(&info.test_name)
            .or_default()
            .extend(get_filter_types(tf_filters.iter().map(String::as_str)));
    }

    module_types
        .into_iter()
        .filter(|(_, types)| types.len() > 1)
        .map(|(name, _)| name.to_owned())
        .collect()
}

/// Returns true if any module has both wildcard and regular filters.
pub fn has_mixed_type_filters<'a>(test_infos: impl IntoIterator<Item = &'a TestInfo>) -> bool {
    !mixed_type_filter_modules(test_infos).is_empty()
}
