// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Java and Kotlin source inspection.

use camino::Utf8Path;
use regex::Regex;
use std::{collections::BTreeSet, fs, sync::LazyLock};
use tracing::debug;

static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*package\s+(?P<package>[^(;|\s)]+)\s*").expect("package regex is valid")
});
static PARAMETERIZED_TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@ParameterizedTest").expect("parameterized test regex is valid")
});
static RUN_WITH_PARAMETERIZED_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*@RunWith\s*\(\s*Parameterized.*(\.|::)class")
        .expect("parameterized runner regex is valid")
});
static SUSPECTED_PARAM_CLASS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*@RunWith\s*\(\s*(TestParameterInjector|JUnitParamsRunner|DataProviderRunner|JukitoRunner|Theories|BedsteadJUnit4)(\.|::)class\s*\)",
    )
    .expect("suspected parameterized runner regex is valid")
});
static BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[()\[\]{}]").expect("bracket regex is valid"));

/// Returns true if `path` has a Java or Kotlin extension.
pub fn is_java_file(path: &Utf8Path) -> bool {
    matches!(path.extension(), Some("java" | "kt"))
}

/// Returns true if `path` has a C++ extension.
pub fn is_cc_file(path: &Utf8Path) -> bool {
    matches!(path.extension(), Some("cc" | "cpp"))
}

/// Returns the package declared in a Java or Kotlin source.
pub fn package_from_source(contents: &str) -> Option<&str> {
    contents
        .lines()
        .find_map(|line| PACKAGE_RE.captures(line))
        .and_then(|captures| captures.name("package"))
        .map(|m| m.as_str())
}

/// Reads the package declared in the file at `path`.
pub fn get_package_name(path: &Utf8Path) -> Option<String> {
    let contents = fs::read_to_string(path)
        .inspect_err(|error| debug!("unable to read {path}: {error}"))
        .ok()?;
    package_from_source(&contents).map(ToOwned::to_owned)
}

/// Returns `package.ClassName` for the source file at `path`.
pub fn get_fully_qualified_class_name(path: &Utf8Path) -> Result<String, String> {
    let package = get_package_name(path).ok_or_else(|| {
        format!("{path}: Test class java file does not contain a package name.")
    })?;
    let class = path.file_stem().unwrap_or_default();
    Ok(format!("{package}.{class}"))
}

/// Returns true if the class at `path` looks like a parameterized test.
pub fn is_parameterized_java_class(path: &Utf8Path) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    contents.lines().any(|line| {
        PARAMETERIZED_TEST_RE.is_match(line)
            || RUN_WITH_PARAMETERIZED_RE.is_match(line)
            || SUSPECTED_PARAM_CLASS_RE.is_match(line)
    })
}

/// Returns the method filters for a Java class.
///
/// For parameterized classes a method without brackets matches every parameter combination, so
/// it gets a trailing `*`.
pub fn get_java_method_filters(path: &Utf8Path, methods: &BTreeSet<String>) -> BTreeSet<String> {
    if !is_parameterized_java_class(path) {
        return methods.clone();
    }
    methods
        .iter()
        .map(|method| {
            if BRACKET_RE.is_match(method) {
                method.clone()
            } else {
                format!("{method}*")
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use maplit::btreeset;

    #[test]
    fn package_declaration() {
        let source = indoc! {"
            /* Copyright */
            package android.foo.cts;

            import org.junit.Test;
        "};
        assert_eq!(package_from_source(source), Some("android.foo.cts"));
        assert_eq!(package_from_source("class Foo {}"), None);
        assert_eq!(package_from_source("package com.example.kt\n"), Some("com.example.kt"));
    }

    #[test]
    fn qualified_name_and_parameterized_methods() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let path = dir.path().join("FooTest.java");
        fs::write(
            &path,
            indoc! {"
                package android.foo;

                @RunWith(Parameterized.class)
                public class FooTest {}
            "},
        )
        .expect("wrote source");

        assert_eq!(
            get_fully_qualified_class_name(&path).as_deref(),
            Ok("android.foo.FooTest")
        );
        assert_eq!(
            get_java_method_filters(&path, &btreeset! {"testA".to_owned(), "testB[1]".to_owned()}),
            btreeset! {"testA*".to_owned(), "testB[1]".to_owned()}
        );

        let plain = dir.path().join("Plain.java");
        fs::write(&plain, "public class Plain {}\n").expect("wrote source");
        assert!(get_fully_qualified_class_name(&plain).is_err());
        assert_eq!(
            get_java_method_filters(&plain, &btreeset! {"testA".to_owned()}),
            btreeset! {"testA".to_owned()}
        );
    }
}
