// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolved, runnable descriptions of tests.
//!
//! A [`TestInfo`] is produced by a finder, enriched by the translator and finally consumed by the
//! runner grouping stage. Resolved sets are kept in a [`BTreeSet`], so two infos describing the
//! same resolved target compare equal and deduplicate.

use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Where a module gets installed, derived from its `installed` paths in module-info.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallLocation {
    /// Installed under a `host/` output directory: the test runs without a device.
    #[serde(rename = "host")]
    Deviceless,

    /// Installed under a `target/` output directory: the test needs a device.
    Device,
}

/// The execution mode a [`TestInfo`] supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ExecMode {
    /// Runs only on the host.
    Deviceless,

    /// Runs only against a device.
    Device,

    /// Can run either way.
    Both,
}

impl ExecMode {
    /// The string form used in messages.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Deviceless => "host",
            Self::Device => "device",
            Self::Both => "both",
        }
    }
}

impl fmt::Display for ExecMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A class (or package, or gtest pattern) plus an optional set of methods to run within it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestFilter {
    /// The class, package or native filter pattern.
    pub class_name: String,

    /// Methods within the class. Empty means the whole class.
    #[serde(default)]
    pub methods: BTreeSet<String>,
}

impl TestFilter {
    /// Creates a new filter.
    pub fn new(
        class_name: impl Into<String>,
        methods: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a filter that selects a whole class.
    pub fn class(class_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            methods: BTreeSet::new(),
        }
    }

    /// Returns the strings Tradefed accepts for this filter, one per method.
    pub fn to_tf_strings(&self) -> Vec<String> {
        if self.methods.is_empty() {
            return vec![self.class_name.clone()];
        }
        self.methods
            .iter()
            .map(|method| format!("{}#{}", self.class_name, method))
            .collect()
    }
}

impl fmt::Display for TestFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.class_name)?;
        if !self.methods.is_empty() {
            write!(f, "#")?;
            for (idx, method) in self.methods.iter().enumerate() {
                if idx > 0 {
                    write!(f, ",")?;
                }
                f.write_str(method)?;
            }
        }
        Ok(())
    }
}

/// A free-form, nested value stored in [`TestData::extra`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DataValue {
    /// A boolean.
    Bool(bool),
    /// An integer.
    Int(i64),
    /// A string.
    Str(String),
    /// A list of values.
    List(Vec<DataValue>),
    /// A map of values.
    Map(BTreeMap<String, DataValue>),
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Attributes attached to a [`TestInfo`].
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TestData {
    /// Class and method filters.
    pub filters: BTreeSet<TestFilter>,

    /// The test config this info was resolved from, relative to the build top.
    pub rel_config: Option<String>,

    /// `(option, value)` pairs from TEST_MAPPING `options`, in declaration order.
    pub module_args: Vec<(String, String)>,

    /// Anything else a finder or runner wants to carry along.
    pub extra: BTreeMap<String, DataValue>,
}

/// A fully resolved, runnable test target.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TestInfo {
    /// The name of the test. For mainline tests this is the full raw reference, e.g.
    /// `Foo[bar.apex]`.
    pub test_name: String,

    /// The name before any mainline decoration.
    #[serde(default)]
    pub raw_test_name: String,

    /// The runner that executes this test.
    pub test_runner: String,

    /// Build targets that must be built before running.
    #[serde(default)]
    pub build_targets: BTreeSet<String>,

    /// Filters, config and other attributes.
    #[serde(default)]
    pub data: TestData,

    /// The finder that resolved this test.
    #[serde(default)]
    pub test_finder: String,

    /// The module class(es) from module-info.
    #[serde(default)]
    pub module_class: Vec<String>,

    /// Where the module gets installed.
    #[serde(default)]
    pub install_locations: BTreeSet<InstallLocation>,

    /// Compatibility suites the module belongs to.
    #[serde(default)]
    pub compatibility_suites: Vec<String>,

    /// Mainline modules this test is parameterized with.
    #[serde(default)]
    pub mainline_modules: BTreeSet<String>,

    /// The suite name, for suite-plan tests.
    #[serde(default)]
    pub suite: Option<String>,

    /// Set when the test was resolved from a TEST_MAPPING entry.
    #[serde(default)]
    pub from_test_mapping: bool,

    /// The `host` value from the TEST_MAPPING entry.
    #[serde(default)]
    pub host: bool,
}

impl TestInfo {
    /// Creates a new `TestInfo` with empty data.
    pub fn new(
        test_name: impl Into<String>,
        test_runner: impl Into<String>,
        build_targets: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let test_name = test_name.into();
        Self {
            raw_test_name: test_name.clone(),
            test_name,
            test_runner: test_runner.into(),
            build_targets: build_targets.into_iter().map(Into::into).collect(),
            data: TestData::default(),
            test_finder: String::new(),
            module_class: Vec::new(),
            install_locations: BTreeSet::new(),
            compatibility_suites: Vec::new(),
            mainline_modules: BTreeSet::new(),
            suite: None,
            from_test_mapping: false,
            host: false,
        }
    }

    /// Sets the filters on this test.
    pub fn with_filters(mut self, filters: impl IntoIterator<Item = TestFilter>) -> Self {
        self.data.filters = filters.into_iter().collect();
        self
    }

    /// Sets the relative config path on this test.
    pub fn with_rel_config(mut self, rel_config: impl Into<String>) -> Self {
        self.data.rel_config = Some(rel_config.into());
        self
    }

    /// Adds a build target.
    pub fn add_build_target(&mut self, target: impl Into<String>) {
        self.build_targets.insert(target.into());
    }

    /// Adds a mainline module.
    pub fn add_mainline_module(&mut self, module: impl Into<String>) {
        self.mainline_modules.insert(module.into());
    }

    /// Returns true if this test is parameterized with mainline modules.
    pub fn is_mainline(&self) -> bool {
        !self.mainline_modules.is_empty()
    }

    /// Returns the execution mode this test supports, based on its install locations.
    ///
    /// A test with no known install location is assumed to need a device.
    pub fn supported_exec_mode(&self) -> ExecMode {
        let host = self.install_locations.contains(&InstallLocation::Deviceless);
        let device = self.install_locations.contains(&InstallLocation::Device);
        match (host, device) {
            (true, true) => ExecMode::Both,
            (true, false) => ExecMode::Deviceless,
            (false, _) => ExecMode::Device,
        }
    }
}

impl fmt::Display for TestInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.test_name, self.test_runner)?;
        if !self.data.filters.is_empty() {
            write!(f, " filters: [")?;
            for (idx, filter) in self.data.filters.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{filter}")?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn filter_tf_strings() {
        assert_eq!(
            TestFilter::class("a.b.FooTest").to_tf_strings(),
            vec!["a.b.FooTest".to_owned()],
        );
        assert_eq!(
            TestFilter::new("a.b.FooTest", ["testB", "testA"]).to_tf_strings(),
            vec!["a.b.FooTest#testA".to_owned(), "a.b.FooTest#testB".to_owned()],
        );
    }

    #[test_case(&[], ExecMode::Device ; "unknown location needs a device")]
    #[test_case(&[InstallLocation::Deviceless], ExecMode::Deviceless ; "host only")]
    #[test_case(&[InstallLocation::Device], ExecMode::Device ; "device only")]
    #[test_case(&[InstallLocation::Device, InstallLocation::Deviceless], ExecMode::Both ; "both")]
    fn exec_mode(locations: &[InstallLocation], expected: ExecMode) {
        let mut info = TestInfo::new("hello_world_test", "AtestTradefedTestRunner", ["x"]);
        info.install_locations = locations.iter().copied().collect();
        assert_eq!(info.supported_exec_mode(), expected);
    }

    #[test]
    fn identical_infos_deduplicate() {
        let a = TestInfo::new("m", "AtestTradefedTestRunner", ["m"])
            .with_filters([TestFilter::class("C")]);
        let b = a.clone();
        let set: BTreeSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }
}
