// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An index over the build system's `module-info.json`.
//!
//! [`ModuleInfo`] is loaded once per invocation and passed by reference to every component that
//! needs to look up modules.

use crate::{
    errors::{ModuleInfoLoadError, ModuleInfoLoadErrorKind},
    test_info::InstallLocation,
};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    sync::LazyLock,
};
use tracing::debug;

/// The module class for Robolectric tests.
pub const ROBOLECTRIC_CLASS: &str = "ROBOLECTRIC";

/// The module class for native tests.
pub const NATIVE_TESTS_CLASS: &str = "NATIVE_TESTS";

/// The name of the test config Tradefed picks up from a module directory.
pub const MODULE_CONFIG: &str = "AndroidTest.xml";

static HOST_INSTALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i).*/host/.*").expect("host install regex is valid"));
static DEVICE_INSTALL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r".*/target/.*").expect("device install regex is valid"));
static MAINLINE_PARAM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<option\s+name="mainline-param"\s+value="(?P<value>[^"]+)"\s*/>"#)
        .expect("mainline-param regex is valid")
});

/// A single entry in `module-info.json`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleRecord {
    /// The module name.
    pub module_name: String,
    /// Directories the module is defined in, relative to the build top.
    pub path: Vec<String>,
    /// Module classes, e.g. `NATIVE_TESTS` or `ROBOLECTRIC`.
    pub class: Vec<String>,
    /// Installed paths.
    pub installed: Vec<String>,
    /// Compatibility suites, e.g. `device-tests`.
    pub compatibility_suites: Vec<String>,
    /// Test configs, relative to the build top.
    pub test_config: Vec<String>,
    /// Whether the build generates a test config.
    pub auto_test_config: Vec<bool>,
    /// Direct dependencies.
    pub dependencies: Vec<String>,
    /// Declared mainline combinations, e.g. `a.apex+b.apk`.
    pub test_mainline_modules: Vec<String>,
    /// `"true"` for unit tests.
    pub is_unit_test: String,
    /// `HOST` and/or `DEVICE`.
    pub supported_variants: Vec<String>,
    /// Source files.
    pub srcs: Vec<String>,
    /// Tags from `test_options`.
    pub test_options_tags: Vec<String>,
}

impl ModuleRecord {
    /// Creates a record with a name and a single path.
    pub fn new(module_name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            path: vec![path.into()],
            ..Default::default()
        }
    }

    /// Returns where this module gets installed.
    pub fn install_locations(&self) -> BTreeSet<InstallLocation> {
        let mut locations = BTreeSet::new();
        for installed in &self.installed {
            if HOST_INSTALL_RE.is_match(installed) {
                locations.insert(InstallLocation::Deviceless);
            } else if DEVICE_INSTALL_RE.is_match(installed) {
                locations.insert(InstallLocation::Device);
            }
        }
        locations
    }

    fn is_auto_gen_test_config(&self) -> bool {
        self.auto_test_config.first().copied().unwrap_or(false)
    }

    fn has_variant(&self, variant: &str) -> bool {
        self.supported_variants.iter().any(|v| v == variant)
    }
}

/// The kind of Robolectric test a module is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RobolectricType {
    /// A Robolectric test with its own test config, run through Tradefed.
    Modern,

    /// A Robolectric test run through the make-based runner.
    Legacy,
}

/// A queryable index of all modules in the build.
#[derive(Clone, Debug, Default)]
pub struct ModuleInfo {
    build_top: Utf8PathBuf,
    modules: BTreeMap<String, ModuleRecord>,
    path_to_modules: BTreeMap<String, BTreeSet<String>>,
}

impl ModuleInfo {
    /// Loads `module-info.json` from `path`. Relative paths in the file are resolved against
    /// `build_top`.
    pub fn load(path: &Utf8Path, build_top: &Utf8Path) -> Result<Self, ModuleInfoLoadError> {
        let contents = fs::read_to_string(path)
            .map_err(|error| ModuleInfoLoadError::new(path, ModuleInfoLoadErrorKind::Read(error)))?;
        let modules: BTreeMap<String, ModuleRecord> = serde_json::from_str(&contents)
            .map_err(|error| ModuleInfoLoadError::new(path, ModuleInfoLoadErrorKind::Parse(error)))?;
        debug!("loaded {} modules from {path}", modules.len());

        let mut module_info = Self::from_records(modules.into_iter().map(|(name, mut record)| {
            if record.module_name.is_empty() {
                record.module_name = name;
            }
            record
        }));
        module_info.build_top = build_top.to_owned();
        Ok(module_info)
    }

    /// Builds an index from records, with an empty build top.
    pub fn from_records(records: impl IntoIterator<Item = ModuleRecord>) -> Self {
        let mut modules = BTreeMap::new();
        let mut path_to_modules: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for record in records {
            for path in &record.path {
                path_to_modules
                    .entry(normalize_rel_path(path))
                    .or_default()
                    .insert(record.module_name.clone());
            }
            modules.insert(record.module_name.clone(), record);
        }
        Self {
            build_top: Utf8PathBuf::new(),
            modules,
            path_to_modules,
        }
    }

    /// Sets the build top used to resolve relative paths.
    pub fn with_build_top(mut self, build_top: impl Into<Utf8PathBuf>) -> Self {
        self.build_top = build_top.into();
        self
    }

    /// The build top.
    pub fn build_top(&self) -> &Utf8Path {
        &self.build_top
    }

    /// Returns true if `name` is a module.
    pub fn is_module(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// Returns the record for `name`.
    pub fn get_module_info(&self, name: &str) -> Option<&ModuleRecord> {
        self.modules.get(name)
    }

    /// Returns the paths `name` is defined in.
    pub fn get_paths(&self, name: &str) -> &[String] {
        self.modules
            .get(name)
            .map(|record| record.path.as_slice())
            .unwrap_or_default()
    }

    /// Returns the names of modules defined in `rel_path`.
    pub fn get_module_names(&self, rel_path: &str) -> Vec<String> {
        self.path_to_modules
            .get(&normalize_rel_path(rel_path))
            .map(|names| names.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the records of modules defined in `rel_path`.
    pub fn modules_in_path<'a>(
        &'a self,
        rel_path: &str,
    ) -> impl Iterator<Item = &'a ModuleRecord> + 'a {
        self.path_to_modules
            .get(&normalize_rel_path(rel_path))
            .into_iter()
            .flatten()
            .filter_map(|name| self.modules.get(name))
    }

    /// Returns the testable modules defined in `rel_path`.
    pub fn get_modules_by_path(&self, rel_path: &str) -> BTreeSet<String> {
        self.modules_in_path(rel_path)
            .filter(|record| self.is_testable_module(record))
            .map(|record| record.module_name.clone())
            .collect()
    }

    /// Returns the testable modules that list `rel_file` among their sources.
    pub fn get_modules_by_src(&self, rel_file: &str) -> BTreeSet<String> {
        self.modules
            .values()
            .filter(|record| record.srcs.iter().any(|src| src == rel_file))
            .filter(|record| self.is_testable_module(record))
            .map(|record| record.module_name.clone())
            .collect()
    }

    /// Iterates over every module.
    pub fn iter(&self) -> impl Iterator<Item = &ModuleRecord> + '_ {
        self.modules.values()
    }

    /// Returns true if the module has a test config: a listed config, an `AndroidTest.xml` in
    /// its directory or an auto-generated one.
    pub fn has_test_config(&self, record: &ModuleRecord) -> bool {
        !record.test_config.is_empty()
            || record
                .path
                .iter()
                .any(|path| self.build_top.join(path).join(MODULE_CONFIG).is_file())
            || record.is_auto_gen_test_config()
    }

    /// Returns true if the record describes something atest can run.
    pub fn is_testable_module(&self, record: &ModuleRecord) -> bool {
        (!record.installed.is_empty() && self.has_test_config(record))
            || self.is_robolectric_test(&record.module_name)
    }

    /// Returns every testable module, optionally restricted to a compatibility suite.
    pub fn get_testable_modules(&self, suite: Option<&str>) -> BTreeSet<String> {
        self.modules
            .values()
            .filter(|record| match suite {
                Some(suite) => record.compatibility_suites.iter().any(|s| s == suite),
                None => true,
            })
            .filter(|record| self.is_testable_module(record))
            .map(|record| record.module_name.clone())
            .collect()
    }

    /// Returns the transitive dependencies of `name` that are themselves modules.
    pub fn get_install_module_dependency(&self, name: &str) -> BTreeSet<String> {
        let mut deps = BTreeSet::new();
        let mut stack = vec![name];
        while let Some(current) = stack.pop() {
            let Some(record) = self.modules.get(current) else {
                continue;
            };
            for dep in &record.dependencies {
                if dep != name && self.is_module(dep) && deps.insert(dep.clone()) {
                    stack.push(dep);
                }
            }
        }
        deps
    }

    /// Returns every host unit test.
    pub fn get_all_host_unit_tests(&self) -> Vec<String> {
        self.modules
            .values()
            .filter(|record| {
                self.is_unit_test(record)
                    && self.is_testable_module(record)
                    && self.is_host_driven_test(record)
            })
            .map(|record| record.module_name.clone())
            .collect()
    }

    /// Returns true if `binaries` is a mainline combination declared for `name`, either in the
    /// build file or in its test config.
    ///
    /// Combinations are compared as sets. An auto-generated config can't be inspected, so it is
    /// accepted.
    pub fn has_mainline_modules(&self, name: &str, binaries: &[String]) -> bool {
        let Some(record) = self.modules.get(name) else {
            return false;
        };
        let wanted: BTreeSet<&str> = binaries.iter().map(String::as_str).collect();
        let same_set = |declared: &str| declared.split('+').collect::<BTreeSet<_>>() == wanted;

        if !record.test_mainline_modules.is_empty() {
            return record.test_mainline_modules.iter().any(|m| same_set(m));
        }
        if let Some(config) = record.test_config.first() {
            if record.is_auto_gen_test_config() {
                return true;
            }
            let params = self.mainline_params(config);
            return params.iter().any(|p| same_set(p));
        }
        false
    }

    fn mainline_params(&self, rel_config: &str) -> Vec<String> {
        let path = self.build_top.join(rel_config);
        match fs::read_to_string(&path) {
            Ok(contents) => MAINLINE_PARAM_RE
                .captures_iter(&contents)
                .map(|c| c["value"].to_owned())
                .collect(),
            Err(error) => {
                debug!("unable to read test config {path}: {error}");
                Vec::new()
            }
        }
    }

    /// Returns true if the test config of `name` is generated by the build.
    pub fn is_auto_gen_test_config(&self, name: &str) -> bool {
        self.modules
            .get(name)
            .is_some_and(ModuleRecord::is_auto_gen_test_config)
    }

    /// Returns true if the module runs on a device through Tradefed.
    pub fn is_device_driven_test(&self, record: &ModuleRecord) -> bool {
        if self.is_robolectric_test(&record.module_name) {
            return false;
        }
        self.is_testable_module(record) && record.has_variant("DEVICE")
    }

    /// Returns true if the module runs on the host through Tradefed.
    pub fn is_host_driven_test(&self, record: &ModuleRecord) -> bool {
        self.is_testable_module(record) && record.has_variant("HOST")
    }

    /// Returns true if the module is marked as a unit test.
    pub fn is_unit_test(&self, record: &ModuleRecord) -> bool {
        record.is_unit_test == "true"
    }

    /// Returns true if the module is a native test.
    pub fn is_native_test(&self, name: &str) -> bool {
        self.modules
            .get(name)
            .is_some_and(|record| record.class.iter().any(|c| c == NATIVE_TESTS_CLASS))
    }

    /// Returns true if the module is tagged as a Mobly test.
    pub fn is_mobly_module(&self, record: &ModuleRecord) -> bool {
        record.test_options_tags.iter().any(|tag| tag == "mobly")
    }

    /// Returns the runnable Robolectric module defined alongside `name`, if any.
    pub fn get_robolectric_test_name(&self, name: &str) -> Option<&str> {
        let record = self.modules.get(name)?;
        let path = record.path.first()?;
        self.path_to_modules
            .get(&normalize_rel_path(path))?
            .iter()
            .filter_map(|m| self.modules.get(m))
            .find(|m| is_robolectric_module(m))
            .map(|m| m.module_name.as_str())
    }

    /// Returns true if `name` is a Robolectric module or shares a directory with one.
    pub fn is_robolectric_test(&self, name: &str) -> bool {
        self.modules.get(name).is_some_and(is_robolectric_module)
            || self.get_robolectric_test_name(name).is_some()
    }

    /// Returns the kind of Robolectric test `name` is, if any.
    pub fn robolectric_type(&self, name: &str) -> Option<RobolectricType> {
        let record = self.modules.get(name)?;
        if is_robolectric_module(record)
            && (!record.test_config.is_empty() || record.is_auto_gen_test_config())
        {
            return Some(RobolectricType::Modern);
        }
        self.is_robolectric_test(name)
            .then_some(RobolectricType::Legacy)
    }

    /// Returns true if `name` is a Robolectric test with its own test config.
    pub fn is_modern_robolectric_test(&self, name: &str) -> bool {
        self.robolectric_type(name) == Some(RobolectricType::Modern)
    }
}

fn is_robolectric_module(record: &ModuleRecord) -> bool {
    record.class.first().is_some_and(|c| c == ROBOLECTRIC_CLASS)
}

fn normalize_rel_path(path: &str) -> String {
    path.trim_end_matches('/').to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;

    const MODULE_INFO_JSON: &str = indoc! {r#"
        {
          "hello_world_test": {
            "class": ["NATIVE_TESTS"],
            "path": ["platform_testing/tests/example/native"],
            "installed": ["out/target/product/vsoc_x86_64/data/nativetest64/hello_world_test"],
            "compatibility_suites": ["general-tests"],
            "auto_test_config": [true],
            "dependencies": ["libfoo"],
            "supported_variants": ["DEVICE"]
          },
          "libfoo": {
            "class": ["SHARED_LIBRARIES"],
            "path": ["external/foo"],
            "dependencies": ["libbar", "libmissing"]
          },
          "libbar": {
            "path": ["external/bar"],
            "dependencies": ["libfoo"]
          },
          "host_unit": {
            "path": ["tools/host_unit"],
            "installed": ["out/host/linux-x86/testcases/host_unit/host_unit"],
            "test_config": ["tools/host_unit/AndroidTest.xml"],
            "is_unit_test": "true",
            "supported_variants": ["HOST"]
          }
        }
    "#};

    fn load() -> (Utf8TempDir, ModuleInfo) {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let path = dir.path().join("module-info.json");
        fs::write(&path, MODULE_INFO_JSON).expect("wrote module-info.json");
        let module_info = ModuleInfo::load(&path, dir.path()).expect("loaded module info");
        (dir, module_info)
    }

    #[test]
    fn load_and_query() {
        let (_dir, module_info) = load();
        assert!(module_info.is_module("hello_world_test"));
        assert!(!module_info.is_module("libmissing"));
        assert_eq!(
            module_info.get_paths("hello_world_test"),
            ["platform_testing/tests/example/native"]
        );
        assert_eq!(
            module_info.get_module_names("platform_testing/tests/example/native/"),
            vec!["hello_world_test".to_owned()]
        );
        assert!(module_info.is_native_test("hello_world_test"));
        assert_eq!(
            module_info.get_modules_by_path("platform_testing/tests/example/native"),
            btreeset! {"hello_world_test".to_owned()}
        );
        assert_eq!(
            module_info.get_modules_by_path("external/foo"),
            BTreeSet::new(),
            "libraries aren't testable"
        );
    }

    #[test]
    fn dependencies_are_transitive_and_cycle_safe() {
        let (_dir, module_info) = load();
        assert_eq!(
            module_info.get_install_module_dependency("hello_world_test"),
            btreeset! {"libbar".to_owned(), "libfoo".to_owned()}
        );
    }

    #[test]
    fn testable_and_host_unit() {
        let (_dir, module_info) = load();
        assert_eq!(
            module_info.get_testable_modules(None),
            btreeset! {"hello_world_test".to_owned(), "host_unit".to_owned()}
        );
        assert_eq!(
            module_info.get_testable_modules(Some("general-tests")),
            btreeset! {"hello_world_test".to_owned()}
        );
        assert_eq!(module_info.get_all_host_unit_tests(), vec!["host_unit"]);
    }

    #[test]
    fn install_locations() {
        let (_dir, module_info) = load();
        let record = module_info.get_module_info("host_unit").expect("module exists");
        assert_eq!(
            record.install_locations(),
            btreeset! {InstallLocation::Deviceless}
        );
        let record = module_info
            .get_module_info("hello_world_test")
            .expect("module exists");
        assert_eq!(record.install_locations(), btreeset! {InstallLocation::Device});
    }

    #[test]
    fn mainline_params_from_config() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        fs::write(
            dir.path().join("AndroidTest.xml"),
            indoc! {r#"
                <configuration>
                    <option name="mainline-param" value="a.apex+b.apk" />
                </configuration>
            "#},
        )
        .expect("wrote config");
        let mut record = ModuleRecord::new("Foo", "");
        record.test_config = vec!["AndroidTest.xml".to_owned()];
        let module_info = ModuleInfo::from_records([record]).with_build_top(dir.path());

        let binaries = |s: &[&str]| s.iter().map(|b| b.to_string()).collect::<Vec<_>>();
        assert!(module_info.has_mainline_modules("Foo", &binaries(&["b.apk", "a.apex"])));
        assert!(!module_info.has_mainline_modules("Foo", &binaries(&["a.apex"])));
    }

    #[test]
    fn robolectric_types() {
        let mut modern = ModuleRecord::new("ModernRoboTests", "packages/modern");
        modern.class = vec![ROBOLECTRIC_CLASS.to_owned()];
        modern.test_config = vec!["packages/modern/AndroidTest.xml".to_owned()];
        let mut legacy_runner = ModuleRecord::new("RunLegacyRoboTests", "packages/legacy");
        legacy_runner.class = vec![ROBOLECTRIC_CLASS.to_owned()];
        let legacy = ModuleRecord::new("LegacyRoboTests", "packages/legacy");
        let module_info = ModuleInfo::from_records([modern, legacy_runner, legacy]);

        assert_eq!(
            module_info.robolectric_type("ModernRoboTests"),
            Some(RobolectricType::Modern)
        );
        assert_eq!(
            module_info.robolectric_type("LegacyRoboTests"),
            Some(RobolectricType::Legacy)
        );
        assert_eq!(
            module_info.get_robolectric_test_name("LegacyRoboTests"),
            Some("RunLegacyRoboTests")
        );
        assert!(module_info.is_modern_robolectric_test("ModernRoboTests"));
    }
}
