// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! gtest class discovery and filter strings.

use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::LazyLock,
};
use tracing::debug;

pub(crate) static CC_CLASS_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*(TYPED_TEST(?:|_P)|TEST(?:|_F|_P))\s*\(\s*(?P<class_name>\w+),\s*(?P<method_name>\w+)\)\s*\{",
    )
    .expect("gtest method regex is valid")
});
static CC_PARAM_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?m)^\s*INSTANTIATE_(?:|TYPED_)TEST_(?:SUITE|CASE)_P\s*\(\s*(?P<instantiate>\w+),\s*(?P<class>\w+)\s*,",
    )
    .expect("gtest instantiation regex is valid")
});
static TYPE_CC_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*TYPED_TEST_SUITE(?:|_P)\(\s*(?P<class_name>\w+)")
        .expect("gtest typed suite regex is valid")
});

/// What a source file declares about one gtest class.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CcClassInfo {
    /// Test names declared for the class.
    pub methods: BTreeSet<String>,
    /// Instantiation prefixes, for parameterized tests.
    pub prefixes: BTreeSet<String>,
    /// Whether the class is a typed test.
    pub typed: bool,
}

/// The kind of gtest a class is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GtestType {
    /// `TEST` or `TEST_F`.
    Regular,
    /// `TYPED_TEST_SUITE`.
    Typed,
    /// `TYPED_TEST_SUITE_P`.
    TypedParameterized,
    /// `TEST_P`.
    ValueParameterized,
}

impl CcClassInfo {
    /// The kind of gtest this is.
    pub fn gtest_type(&self) -> GtestType {
        match (self.prefixes.is_empty(), self.typed) {
            (false, true) => GtestType::TypedParameterized,
            (false, false) => GtestType::ValueParameterized,
            (true, true) => GtestType::Typed,
            (true, false) => GtestType::Regular,
        }
    }
}

/// Returns the gtest classes declared in `content`.
pub fn get_cc_class_info(content: &str) -> BTreeMap<String, CcClassInfo> {
    let mut class_info: BTreeMap<String, CcClassInfo> = BTreeMap::new();
    for captures in CC_CLASS_METHOD_RE.captures_iter(content) {
        class_info
            .entry(captures["class_name"].to_owned())
            .or_default()
            .methods
            .insert(captures["method_name"].to_owned());
    }
    for captures in CC_PARAM_CLASS_RE.captures_iter(content) {
        match class_info.get_mut(&captures["class"]) {
            Some(info) => {
                info.prefixes.insert(captures["instantiate"].to_owned());
            }
            None => debug!("{} is instantiated without tests", &captures["class"]),
        }
    }
    for captures in TYPE_CC_CLASS_RE.captures_iter(content) {
        match class_info.get_mut(&captures["class_name"]) {
            Some(info) => info.typed = true,
            None => debug!("{} is a typed suite without tests", &captures["class_name"]),
        }
    }
    class_info
}

/// Returns the gtest filter for `class_name` and `methods`.
///
/// * Typed tests: `C/*.m1:C/*.m2` or `C/*.*`.
/// * Value-parameterized tests: `*/C.*`, or `prefix/C.*` if the prefix was given.
/// * Everything else: `C.m1:C.m2` or `C.*`.
pub fn get_cc_filter(
    class_info: &BTreeMap<String, CcClassInfo>,
    class_name: &str,
    methods: &BTreeSet<String>,
) -> String {
    let bare_name = class_name.rsplit('/').next().unwrap_or(class_name);
    let gtest_type = class_info
        .get(bare_name)
        .map_or(GtestType::Regular, CcClassInfo::gtest_type);
    debug!("{bare_name} is a {gtest_type:?} gtest");

    let class_name = match gtest_type {
        GtestType::TypedParameterized | GtestType::ValueParameterized
            if !class_name.contains('/') =>
        {
            format!("*/{class_name}")
        }
        _ => class_name.to_owned(),
    };
    let typed = matches!(
        gtest_type,
        GtestType::Typed | GtestType::TypedParameterized
    );

    let separator = if typed { "/*." } else { "." };
    if methods.is_empty() {
        return format!("{class_name}{separator}*");
    }
    methods
        .iter()
        .map(|method| format!("{class_name}{separator}{method}"))
        .collect::<Vec<_>>()
        .join(":")
}
