// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading tests from `TEST_MAPPING` files.
//!
//! A TEST_MAPPING file maps group names such as `presubmit` to lists of tests, and may import
//! other TEST_MAPPING files. The files in a directory and all of its parents (and optionally its
//! subdirectories) are merged.

use crate::{
    errors::{TestMappingError, TestMappingParseError},
    module_info::ModuleInfo,
    test_identifier::TestIdentifier,
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use regex::{Captures, Regex};
use serde::Deserialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    ffi::OsStr,
    fmt, fs,
    sync::LazyLock,
};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The file name of TEST_MAPPING files.
pub const TEST_MAPPING: &str = "TEST_MAPPING";

/// The group name that selects every group.
pub const TEST_GROUP_ALL: &str = "all";

const IMPORTS_KEY: &str = "imports";

static COMMENTS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)[\s\t]*(#|//).*|(".*?")"#).expect("comments regex is valid")
});

/// A single test entry from a TEST_MAPPING file.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TestDetail {
    /// The test reference.
    pub name: String,
    /// `(option, value)` pairs, in declaration order.
    pub options: Vec<(String, String)>,
    /// Whether the test runs on the host.
    pub host: bool,
}

impl TestDetail {
    /// Creates a detail with no options.
    pub fn new(name: impl Into<String>, host: bool) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
            host,
        }
    }

    fn from_raw(raw: RawTest) -> Self {
        let options = raw
            .options
            .into_iter()
            .flat_map(|option| option.into_iter())
            .map(|(key, value)| {
                let value = match value {
                    serde_json::Value::String(value) => value,
                    other => other.to_string(),
                };
                (key, value)
            })
            .collect();
        Self {
            name: raw.name,
            options,
            host: raw.host,
        }
    }
}

impl fmt::Display for TestDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.options.is_empty() {
            write!(
                f,
                " ({})",
                self.options
                    .iter()
                    .map(|(key, value)| format!("{key}: {value}"))
                    .join(", ")
            )?;
        }
        if self.host {
            f.write_str(" - runs on host without device")?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct RawTest {
    name: String,
    #[serde(default)]
    options: Vec<BTreeMap<String, serde_json::Value>>,
    #[serde(default)]
    host: bool,
}

#[derive(Debug, Deserialize)]
struct RawImport {
    path: String,
}

/// Tests grouped by TEST_MAPPING group name.
pub type GroupedTests = BTreeMap<String, BTreeSet<TestDetail>>;

/// The contents of one TEST_MAPPING file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestMappingFile {
    /// The tests, grouped by name.
    pub groups: GroupedTests,
    /// Imported directories, relative to the build top.
    pub imports: Vec<String>,
}

/// Removes `#` and `//` comments, leaving quoted strings alone.
pub fn strip_comments(contents: &str) -> String {
    COMMENTS_RE
        .replace_all(contents, |captures: &Captures<'_>| {
            let matched = captures[0].trim();
            if matched.starts_with('#') || matched.starts_with("//") {
                String::new()
            } else {
                matched.to_owned()
            }
        })
        .into_owned()
}

/// The result of a TEST_MAPPING search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestMappingTests {
    /// Tests in the selected groups.
    pub tests: BTreeSet<TestDetail>,
    /// Every test found, in every group.
    pub all_tests: GroupedTests,
}

/// Finds tests in TEST_MAPPING files.
#[derive(Debug)]
pub struct TestMappingSearch<'a> {
    module_info: &'a ModuleInfo,
    suites: &'a [String],
    include_subdirs: bool,
}

impl<'a> TestMappingSearch<'a> {
    /// Creates a new search. Entries outside `suites` produce a warning.
    pub fn new(module_info: &'a ModuleInfo, suites: &'a [String]) -> Self {
        Self {
            module_info,
            suites,
            include_subdirs: false,
        }
    }

    /// Also collects TEST_MAPPING files in subdirectories.
    pub fn include_subdirs(mut self, include_subdirs: bool) -> Self {
        self.include_subdirs = include_subdirs;
        self
    }

    fn build_top(&self) -> &Utf8Path {
        self.module_info.build_top()
    }

    /// Reads and validates a single TEST_MAPPING file.
    pub fn read_file(&self, path: &Utf8Path) -> Result<TestMappingFile, TestMappingError> {
        let contents = fs::read_to_string(path).map_err(|error| TestMappingError::Read {
            path: path.to_owned(),
            error,
        })?;
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&strip_comments(&contents))
                .map_err(|error| TestMappingParseError::new(path, error))?;

        let mut file = TestMappingFile::default();
        for (group, value) in raw {
            if group == IMPORTS_KEY {
                let imports: Vec<RawImport> = serde_json::from_value(value)
                    .map_err(|error| TestMappingParseError::new(path, error))?;
                file.imports
                    .extend(imports.into_iter().map(|import| import.path));
                continue;
            }
            let tests: Vec<RawTest> = serde_json::from_value(value)
                .map_err(|error| TestMappingParseError::new(path, error))?;
            let grouped = file.groups.entry(group).or_default();
            for test in tests {
                self.warn_if_undiscoverable(&test.name);
                grouped.insert(TestDetail::from_raw(test));
            }
        }
        Ok(file)
    }

    fn warn_if_undiscoverable(&self, name: &str) {
        let test_name = TestIdentifier::parse(name).test_name;
        match self.module_info.get_module_info(&test_name) {
            None => warn!(
                "{name} is not a valid build target and may not be discoverable by TreeHugger. \
                 If you want to specify a class or test-package, please set 'name' to the test \
                 module and use 'options' to specify the right tests via 'include-filter'.\n\
                 Note: this can also occur if the test module is not built for your current \
                 lunch target."
            ),
            Some(record)
                if !record
                    .compatibility_suites
                    .iter()
                    .any(|suite| self.suites.contains(suite)) =>
            {
                warn!(
                    "Please add {name} to either suite: [{}] for this TEST_MAPPING file to work \
                     with TreeHugger.",
                    self.suites.iter().join(", ")
                )
            }
            Some(_) => {}
        }
    }

    /// Finds the tests in `groups` from the TEST_MAPPING files in `path`, its parents up to the
    /// build top and everything they import.
    pub fn find_tests(
        &self,
        path: &Utf8Path,
        groups: &[String],
    ) -> Result<TestMappingTests, TestMappingError> {
        let mut checked = BTreeSet::new();
        self.find_tests_impl(path, groups, &mut checked)
    }

    fn find_tests_impl(
        &self,
        path: &Utf8Path,
        groups: &[String],
        checked: &mut BTreeSet<Utf8PathBuf>,
    ) -> Result<TestMappingTests, TestMappingError> {
        let path = path.canonicalize_utf8().unwrap_or_else(|_| path.to_owned());
        let mut files = self.collect_files(&path);
        files.retain(|file| !checked.contains(file));
        checked.extend(files.iter().cloned());

        let mut result = TestMappingTests::default();
        let mut imports = Vec::new();
        for file in &files {
            debug!("reading {file}");
            let parsed = self.read_file(file)?;
            imports.extend(parsed.imports);
            for (group, tests) in parsed.groups {
                result.all_tests.entry(group).or_default().extend(tests);
            }
        }
        result.tests = select_groups(&result.all_tests, groups);

        for import in imports {
            let import_path = self.build_top().join(&import);
            if !import_path.exists() {
                warn!("Failed to import TEST_MAPPING at {import_path}");
                continue;
            }
            let imported = self.find_tests_impl(&import_path, groups, checked)?;
            result.tests.extend(imported.tests);
            for (group, tests) in imported.all_tests {
                result.all_tests.entry(group).or_default().extend(tests);
            }
        }
        Ok(result)
    }

    fn collect_files(&self, path: &Utf8Path) -> BTreeSet<Utf8PathBuf> {
        let mut files = BTreeSet::new();
        let own = path.join(TEST_MAPPING);
        if own.is_file() {
            files.insert(own);
        }
        if self.include_subdirs {
            files.extend(
                WalkDir::new(path)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .filter(|entry| entry.file_name() == OsStr::new(TEST_MAPPING))
                    .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok()),
            );
        }

        let mut current = path;
        while current != self.build_top() {
            let Some(parent) = current.parent() else {
                break;
            };
            current = parent;
            let file = current.join(TEST_MAPPING);
            if file.is_file() {
                files.insert(file);
            }
        }
        files
    }
}

/// Returns the tests in `groups`. The `all` group selects every group.
pub fn select_groups(all_tests: &GroupedTests, groups: &[String]) -> BTreeSet<TestDetail> {
    let mut tests = BTreeSet::new();
    for group in groups {
        if group == TEST_GROUP_ALL {
            tests.extend(all_tests.values().flatten().cloned());
        } else if let Some(grouped) = all_tests.get(group) {
            tests.extend(grouped.iter().cloned());
        }
    }
    tests
}

/// Splits the first reference of a TEST_MAPPING run into a source path and the groups to run.
///
/// `path:group` selects a single group; otherwise `default_groups` are used.
pub fn parse_test_mapping_reference(
    first_ref: Option<&str>,
    default_groups: &[String],
) -> Result<(String, Vec<String>), TestMappingError> {
    let Some(first_ref) = first_ref else {
        return Ok((String::new(), default_groups.to_vec()));
    };
    match first_ref.split(':').collect::<Vec<_>>().as_slice() {
        [path] => Ok(((*path).to_owned(), default_groups.to_vec())),
        [path, group] => Ok(((*path).to_owned(), vec![(*group).to_owned()])),
        _ => Err(TestMappingError::InvalidArgs {
            message: format!("expected `path:group`, found `{first_ref}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module_info::ModuleRecord;
    use indoc::indoc;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn comments_are_stripped() {
        let input = indoc! {r#"
            {
              // A comment.
              "presubmit": [
                # Another comment.
                {"name": "http://not-a-comment"}
              ]
            }
        "#};
        let value: serde_json::Value =
            serde_json::from_str(&strip_comments(input)).expect("valid JSON after stripping");
        assert_eq!(value["presubmit"][0]["name"], "http://not-a-comment");
    }

    #[test_case(None, "", &["presubmit", "presubmit-large"] ; "no reference")]
    #[test_case(Some("a/b"), "a/b", &["presubmit", "presubmit-large"] ; "path only")]
    #[test_case(Some("a/b:postsubmit"), "a/b", &["postsubmit"] ; "path and group")]
    #[test_case(Some(":all"), "", &["all"] ; "group only")]
    fn reference_parsing(first_ref: Option<&str>, path: &str, groups: &[&str]) {
        let defaults = vec!["presubmit".to_owned(), "presubmit-large".to_owned()];
        let (parsed_path, parsed_groups) =
            parse_test_mapping_reference(first_ref, &defaults).expect("valid reference");
        assert_eq!(parsed_path, path);
        assert_eq!(parsed_groups, groups);
    }

    #[test]
    fn too_many_colons() {
        parse_test_mapping_reference(Some("a:b:c"), &[]).expect_err("invalid reference");
    }

    struct Fixture {
        _dir: camino_tempfile::Utf8TempDir,
        root: Utf8PathBuf,
        module_info: ModuleInfo,
        suites: Vec<String>,
    }

    fn fixture() -> Fixture {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let root = dir.path().canonicalize_utf8().expect("canonicalized temp dir");
        let write = |rel: &str, contents: &str| {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().expect("path has a parent")).expect("created dirs");
            fs::write(path, contents).expect("wrote file");
        };
        write(
            "TEST_MAPPING",
            indoc! {r#"
                {
                  "postsubmit": [{"name": "RootTests"}]
                }
            "#},
        );
        write(
            "a/TEST_MAPPING",
            indoc! {r#"
                {
                  "presubmit": [
                    {
                      "name": "ATests",
                      "options": [{"include-filter": "a.b.C"}, {"exclude-annotation": "Flaky"}]
                    },
                    {"name": "HostTests", "host": true}
                  ],
                  "imports": [{"path": "c"}, {"path": "missing"}]
                }
            "#},
        );
        write(
            "a/b/TEST_MAPPING",
            r#"{"presubmit-large": [{"name": "BTests"}]}"#,
        );
        write(
            "c/TEST_MAPPING",
            indoc! {r#"
                {
                  "presubmit": [{"name": "CTests"}],
                  "imports": [{"path": "a"}]
                }
            "#},
        );

        let mut records = Vec::new();
        for name in ["RootTests", "ATests", "HostTests", "BTests", "CTests"] {
            let mut record = ModuleRecord::new(name, "x");
            record.compatibility_suites = vec!["general-tests".to_owned()];
            records.push(record);
        }
        let module_info = ModuleInfo::from_records(records).with_build_top(&root);
        Fixture {
            _dir: dir,
            root,
            module_info,
            suites: vec!["device-tests".to_owned(), "general-tests".to_owned()],
        }
    }

    fn names(tests: &BTreeSet<TestDetail>) -> BTreeSet<&str> {
        tests.iter().map(|t| t.name.as_str()).collect()
    }

    #[test]
    fn parents_and_imports() {
        let fixture = fixture();
        let search = TestMappingSearch::new(&fixture.module_info, &fixture.suites);
        let groups = vec!["presubmit".to_owned(), "presubmit-large".to_owned()];
        let found = search
            .find_tests(&fixture.root.join("a"), &groups)
            .expect("valid TEST_MAPPING files");

        assert_eq!(
            names(&found.tests),
            btreeset! {"ATests", "HostTests", "CTests"},
            "subdirectories are excluded by default, imports are followed once"
        );
        assert_eq!(
            found.all_tests.keys().map(String::as_str).collect::<Vec<_>>(),
            ["postsubmit", "presubmit"]
        );

        let a_tests = found
            .tests
            .iter()
            .find(|t| t.name == "ATests")
            .expect("ATests found");
        assert_eq!(
            a_tests.options,
            vec![
                ("include-filter".to_owned(), "a.b.C".to_owned()),
                ("exclude-annotation".to_owned(), "Flaky".to_owned()),
            ]
        );
        assert!(found.tests.iter().any(|t| t.name == "HostTests" && t.host));
    }

    #[test]
    fn subdirs_and_all_group() {
        let fixture = fixture();
        let search =
            TestMappingSearch::new(&fixture.module_info, &fixture.suites).include_subdirs(true);
        let found = search
            .find_tests(&fixture.root.join("a"), &[TEST_GROUP_ALL.to_owned()])
            .expect("valid TEST_MAPPING files");
        assert_eq!(
            names(&found.tests),
            btreeset! {"RootTests", "ATests", "HostTests", "BTests", "CTests"}
        );
    }

    #[test]
    fn invalid_json() {
        let fixture = fixture();
        let path = fixture.root.join("bad/TEST_MAPPING");
        fs::create_dir_all(path.parent().expect("path has a parent")).expect("created dir");
        fs::write(&path, "{\"presubmit\": [}").expect("wrote file");

        let search = TestMappingSearch::new(&fixture.module_info, &fixture.suites);
        let error = search.read_file(&path).expect_err("invalid JSON");
        assert!(
            matches!(error, TestMappingError::Parse(ref e) if e.path() == &path),
            "unexpected error: {error:?}"
        );
    }
}
