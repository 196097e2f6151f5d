// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resolving modules, classes, packages and paths against module-info.

use super::{
    cc_filter::{get_cc_class_info, get_cc_filter},
    java_filter::{
        get_fully_qualified_class_name, get_java_method_filters, get_package_name, is_cc_file,
        is_java_file,
    },
    reference_type::{ModuleReference, split_methods},
    source_index::{SourceSearch, has_methods_in_file},
};
use crate::{
    helpers::{modules_in_target, rel_to_root},
    levenshtein::{EditCosts, distance},
    module_info::{MODULE_CONFIG, ModuleInfo, RobolectricType},
    runner::RunnerKind,
    test_info::{DataValue, InstallLocation, TestFilter, TestInfo},
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use regex::Regex;
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    sync::LazyLock,
    time::Instant,
};
use tracing::{debug, info};

/// The result of a find method: the tests found, or a discovery error message.
pub(crate) type FindResult = Result<Vec<TestInfo>, String>;

/// Harness modules needed to run tests of a compatibility suite.
const SUITE_DEPS: &[(&str, &str)] = &[("cts", "cts-tradefed")];
const CTS_JAR: &str = "cts-tradefed";
const MTS_SUITE: &str = "mts";
const JAVA_LIBRARIES_CLASS: &str = "JAVA_LIBRARIES";
const DALVIK_TEST_DEPS: &[&str] = &[
    "cts-dalvik-device-test-runner",
    "cts-dalvik-host-test-runner",
    CTS_JAR,
];
const DALVIK_TESTRUNNER_JAR_CLASSES: &[&str] = &[
    "com.android.compatibility.testtype.DalvikTest",
    "com.android.compatibility.testtype.LibcoreTest",
];
const COMPATIBILITY_PACKAGE_PREFIX: &str = "com.android.compatibility";
const PERF_SETUP_LABEL: &str = "perf-setup.sh";
const PERF_SETUP_TARGET: &str = "perf-setup";
const BUILD_FILES: &[&str] = &["Android.bp", "Android.mk"];

static OPTION_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<option\b[^>]*>").expect("option tag regex is valid"));
static XML_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?P<key>[\w:.-]+)\s*=\s*"(?P<value>[^"]*)""#).expect("attribute regex is valid")
});
static CLASS_ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\sclass\s*=\s*"(?P<class>[^"]*)""#).expect("class attribute regex is valid")
});
static APK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[^/]+\.apk$").expect("apk regex is valid"));

/// Resolves references against module-info and the source tree.
#[derive(Debug)]
pub struct ModuleFinder<'a> {
    module_info: &'a ModuleInfo,
    search: SourceSearch<'a>,
    cwd: Utf8PathBuf,
}

impl<'a> ModuleFinder<'a> {
    pub(crate) fn new(module_info: &'a ModuleInfo, search: SourceSearch<'a>, cwd: Utf8PathBuf) -> Self {
        Self {
            module_info,
            search,
            cwd,
        }
    }

    fn build_top(&self) -> &Utf8Path {
        self.module_info.build_top()
    }

    /// Finds the test for a module name: one test per test config.
    pub fn find_test_by_module_name(&self, module_name: &str) -> FindResult {
        let Some(record) = self.module_info.get_module_info(module_name) else {
            return Ok(Vec::new());
        };
        if !self.module_info.is_testable_module(record) {
            return Ok(Vec::new());
        }
        let rel_config = record
            .path
            .first()
            .map(|path| format!("{path}/{MODULE_CONFIG}"));

        Ok(self
            .get_module_test_config(module_name, rel_config.as_deref())
            .into_iter()
            .filter_map(|rel_config| {
                self.process_test_info(
                    TestInfo::new(module_name, RunnerKind::Tradefed.name(), Vec::<String>::new())
                        .with_rel_config(rel_config),
                )
            })
            .collect())
    }

    /// Finds tests for a class name, optionally restricted to a module.
    ///
    /// `class_ref` may carry methods (`Class#a,b`). The module directory is searched first, then
    /// the whole tree. If the class can't be found but a module was given, the module's paths
    /// are used instead.
    pub fn find_test_by_class_name(
        &self,
        class_ref: &str,
        module_name: Option<&str>,
        rel_config: Option<&str>,
        is_native_test: bool,
    ) -> FindResult {
        let (class_name, methods) = split_methods(class_ref)?;
        let search_class_name = class_name.rsplit('/').next().unwrap_or(class_name);

        let search_dir = match rel_config {
            Some(rel_config) => self.build_top().join(parent_dir(rel_config)),
            None => self.build_top().to_owned(),
        };
        let mut test_paths =
            self.search
                .find_class_files(&search_dir, search_class_name, is_native_test, &methods);
        if test_paths.is_empty() {
            if let Some(rel_config) = rel_config {
                info!(
                    "Did not find class ({class_name}) under module path ({rel_config}), \
                     researching from repo root."
                );
                test_paths = self.search.find_class_files(
                    self.build_top(),
                    search_class_name,
                    is_native_test,
                    &methods,
                );
            }
        }
        if test_paths.is_empty() {
            let Some(module_name) = module_name else {
                return Ok(Vec::new());
            };
            test_paths = self
                .module_info
                .get_paths(module_name)
                .iter()
                .map(|path| self.build_top().join(path))
                .collect();
        }

        let mut infos = Vec::new();
        for test_path in test_paths {
            let filters = self.get_test_info_filter(
                &test_path,
                &methods,
                Some(class_name),
                is_native_test,
                None,
            )?;
            infos.extend(self.get_test_infos(&test_path, rel_config, module_name, filters));
        }
        Ok(infos)
    }

    /// Finds tests for `module:class[#methods]`.
    pub fn find_test_by_module_and_class(&self, module_class: &str) -> FindResult {
        let Some(reference) = ModuleReference::parse(module_class) else {
            return Ok(Vec::new());
        };
        let class_ref = with_methods(reference.pkg_class, reference.methods);
        let module_infos = self.find_test_by_module_name(reference.module)?;
        let Some(module_test) = module_infos.first() else {
            return Ok(Vec::new());
        };
        let rel_config = module_test.data.rel_config.as_deref();

        let found = self.find_test_by_class_name(
            &class_ref,
            Some(reference.module),
            rel_config,
            self.module_info.is_native_test(reference.module),
        )?;
        if !found.is_empty() {
            return Ok(found);
        }
        self.find_test_by_cc_class_name(&class_ref, Some(reference.module), rel_config)
    }

    /// Finds tests for a Java package, optionally restricted to a module.
    pub fn find_test_by_package_name(
        &self,
        package_ref: &str,
        module_name: Option<&str>,
        rel_config: Option<&str>,
    ) -> FindResult {
        let (package, methods) = split_methods(package_ref)?;
        if !methods.is_empty() {
            return Err(format!(
                "{}: Method filtering requires class",
                methods.iter().join(",")
            ));
        }

        let search_dir = match rel_config {
            Some(rel_config) => self.build_top().join(parent_dir(rel_config)),
            None => self.build_top().to_owned(),
        };
        let mut package_paths = self.search.find_package_dirs(&search_dir, package);
        if package_paths.is_empty() {
            let Some(module_name) = module_name else {
                return Ok(Vec::new());
            };
            package_paths = self
                .module_info
                .get_paths(module_name)
                .iter()
                .map(|path| self.build_top().join(path))
                .collect();
        }

        let filters: BTreeSet<TestFilter> = [TestFilter::class(package)].into_iter().collect();
        Ok(package_paths
            .iter()
            .flat_map(|path| self.get_test_infos(path, rel_config, module_name, filters.clone()))
            .collect())
    }

    /// Finds tests for `module:package`.
    pub fn find_test_by_module_and_package(&self, module_package: &str) -> FindResult {
        let Some(reference) = ModuleReference::parse(module_package) else {
            return Ok(Vec::new());
        };
        let package_ref = with_methods(reference.pkg_class, reference.methods);
        let module_infos = self.find_test_by_module_name(reference.module)?;
        let Some(module_test) = module_infos.first() else {
            return Ok(Vec::new());
        };
        self.find_test_by_package_name(
            &package_ref,
            Some(reference.module),
            module_test.data.rel_config.as_deref(),
        )
    }

    /// Finds tests for a path to a source file, a build file or a directory.
    ///
    /// * A Java file resolves to its class, a C++ file to the gtest classes in it.
    /// * A module directory or build file resolves to the modules there.
    /// * A directory of Java sources resolves to their package.
    pub fn find_test_by_path(&self, path_ref: &str) -> FindResult {
        debug!("finding test by path: {path_ref}");
        let (path, methods) = split_methods(path_ref)?;
        let Ok(path) = self.cwd.join(path).canonicalize_utf8() else {
            return Ok(Vec::new());
        };
        if !methods.is_empty() && !has_methods_in_file(&path, &methods) {
            return Ok(Vec::new());
        }

        let dir = if path.is_file() {
            path.parent().map_or_else(|| path.clone(), Utf8Path::to_owned)
        } else {
            path.clone()
        };
        if let Some(rel_module_dir) = self.find_parent_module_dir(&dir) {
            let rel_config = format!("{rel_module_dir}/{MODULE_CONFIG}");
            let filters =
                self.get_test_info_filter(&path, &methods, None, false, Some(&rel_module_dir))?;
            return Ok(self.get_test_infos(&path, Some(&rel_config), None, filters));
        }

        let Some(rel_path) = rel_to_root(self.build_top(), &path) else {
            return Ok(Vec::new());
        };
        let src_modules = self.module_info.get_modules_by_src(rel_path.as_str());
        if !src_modules.is_empty() {
            let filters = self.get_test_info_filter(&path, &methods, None, false, None)?;
            let mut infos = Vec::new();
            for module in &src_modules {
                let Some(module_path) = self.module_info.get_paths(module).first() else {
                    continue;
                };
                let rel_config = format!("{module_path}/{MODULE_CONFIG}");
                infos.extend(self.get_test_infos(
                    &path,
                    Some(&rel_config),
                    Some(module),
                    filters.clone(),
                ));
            }
            return Ok(infos);
        }

        let mut infos = Vec::new();
        for unit_test in find_host_unit_tests(self.module_info, rel_path.as_str()) {
            infos.extend(self.get_test_infos(
                &path,
                Some(MODULE_CONFIG),
                Some(&unit_test),
                BTreeSet::new(),
            ));
        }
        Ok(infos)
    }

    /// Finds tests for a gtest class name. Anything up to the last `.` is dropped.
    pub fn find_test_by_cc_class_name(
        &self,
        class_ref: &str,
        module_name: Option<&str>,
        rel_config: Option<&str>,
    ) -> FindResult {
        let class_ref = match class_ref.rsplit_once('.') {
            Some((_, class_ref)) => {
                info!("Search with updated class name: {class_ref}");
                class_ref
            }
            None => class_ref,
        };
        self.find_test_by_class_name(class_ref, module_name, rel_config, true)
    }

    /// Finds the test whose config file is named `config_name`.
    pub fn find_test_by_config_name(&self, config_name: &str) -> FindResult {
        for record in self.module_info.iter() {
            for test_config in &record.test_config {
                if Utf8Path::new(test_config).file_stem() != Some(config_name) {
                    continue;
                }
                let mut info = TestInfo::new(
                    config_name,
                    RunnerKind::Tradefed.name(),
                    self.get_build_targets(&record.module_name, test_config),
                )
                .with_rel_config(test_config.clone());
                info.module_class = record.class.clone();
                info.install_locations = record.install_locations();
                info.compatibility_suites = record.compatibility_suites.clone();
                return Ok(vec![info]);
            }
        }
        Ok(Vec::new())
    }

    /// Returns testable modules whose names are within `ld_range` edits of `user_input`.
    ///
    /// Only modules whose length is within `ld_range` of the input are compared; an `ld_range`
    /// of 0 compares every module and accepts any distance.
    pub fn fuzzy_search(&self, user_input: &str, costs: EditCosts, ld_range: usize) -> Vec<String> {
        info!("Searching for similar module names using fuzzy search...");
        let start = Instant::now();
        let len = user_input.chars().count();
        let lower_bound = len.saturating_sub(ld_range);
        let upper_bound = len + ld_range;

        let mut modules: Vec<String> = self
            .module_info
            .get_testable_modules(None)
            .into_iter()
            .collect();
        modules.sort_by_key(|name| name.chars().count());

        let mut guessed = Vec::new();
        for module in modules {
            let module_len = module.chars().count();
            if ld_range != 0 {
                if module_len < lower_bound {
                    continue;
                }
                if module_len > upper_bound {
                    break;
                }
            }
            let score = distance(user_input, &module, costs);
            if ld_range == 0 || score <= ld_range {
                guessed.push((score, module));
            }
        }
        guessed.sort();
        debug!("fuzzy search took {:?}", start.elapsed());
        guessed.into_iter().map(|(_, module)| module).collect()
    }

    /// Fills in module-specific details, or returns `None` if the test isn't a module.
    fn process_test_info(&self, mut test: TestInfo) -> Option<TestInfo> {
        let module_name = test.test_name.clone();
        let record = self.module_info.get_module_info(&module_name)?;
        test.module_class = record.class.clone();
        test.install_locations = record.install_locations();
        test.compatibility_suites = record.compatibility_suites.clone();

        if self.module_info.is_mobly_module(record) {
            test.test_runner = RunnerKind::Mobly.name().to_owned();
            test.add_build_target(&module_name);
            test.data.extra.insert(
                "installed".to_owned(),
                DataValue::List(record.installed.iter().map(|p| p.as_str().into()).collect()),
            );
            return Some(test);
        }

        match self.module_info.robolectric_type(&module_name) {
            Some(RobolectricType::Modern) => {
                test.install_locations = [InstallLocation::Deviceless].into_iter().collect();
                test.add_build_target(&module_name);
                return Some(test);
            }
            Some(RobolectricType::Legacy) => {
                test.install_locations = [InstallLocation::Deviceless].into_iter().collect();
                test.test_runner = RunnerKind::Robolectric.name().to_owned();
                if let Some(name) = self.module_info.get_robolectric_test_name(&module_name) {
                    test.test_name = name.to_owned();
                    test.raw_test_name = name.to_owned();
                }
                return Some(test);
            }
            None => {}
        }

        let rel_config = test.data.rel_config.clone().unwrap_or_default();
        for target in self.get_build_targets(&module_name, &rel_config) {
            test.add_build_target(target);
        }
        if self.module_info.is_auto_gen_test_config(&module_name)
            && test.module_class.iter().any(|c| c == JAVA_LIBRARIES_CLASS)
        {
            for dep in DALVIK_TEST_DEPS {
                if self.module_info.is_module(dep) {
                    test.add_build_target(*dep);
                }
            }
        }
        if record
            .test_config
            .iter()
            .position(|config| *config == rel_config)
            .is_some_and(|idx| idx > 0)
        {
            if let Some(stem) = Utf8Path::new(&rel_config).file_stem() {
                debug!("renaming {} to {stem}", test.test_name);
                test.test_name = stem.to_owned();
                test.raw_test_name = stem.to_owned();
            }
        }
        Some(test)
    }

    fn get_build_targets(&self, module_name: &str, rel_config: &str) -> BTreeSet<String> {
        let mut targets = if self.module_info.is_auto_gen_test_config(module_name) {
            BTreeSet::new()
        } else {
            get_targets_from_xml(&self.build_top().join(rel_config), self.module_info)
        };
        let suites = self
            .module_info
            .get_module_info(module_name)
            .map(|record| record.compatibility_suites.as_slice())
            .unwrap_or_default();
        for suite in suites {
            for (dep_suite, dep) in SUITE_DEPS {
                if suite == dep_suite {
                    targets.insert((*dep).to_owned());
                }
            }
        }
        for path in self.module_info.get_paths(module_name) {
            targets.insert(modules_in_target(path));
        }
        if self.module_info.is_module(module_name) {
            targets.insert(module_name.to_owned());
        }
        if suites.iter().any(|suite| suite == MTS_SUITE) && self.module_info.is_module(CTS_JAR) {
            targets.insert(CTS_JAR.to_owned());
        }
        targets
    }

    /// The configs to run for a module: those listed in module-info, or `rel_config`.
    fn get_module_test_config(&self, module_name: &str, rel_config: Option<&str>) -> Vec<String> {
        if let Some(record) = self.module_info.get_module_info(module_name) {
            if !record.test_config.is_empty() {
                return record.test_config.clone();
            }
        }
        rel_config.map(ToOwned::to_owned).into_iter().collect()
    }

    fn get_test_info_filter(
        &self,
        path: &Utf8Path,
        methods: &BTreeSet<String>,
        class_name: Option<&str>,
        is_native_test: bool,
        rel_module_dir: Option<&str>,
    ) -> Result<BTreeSet<TestFilter>, String> {
        let mut filters = BTreeSet::new();
        if path.is_file() {
            if is_native_test {
                let class_info = get_cc_class_info(&read_source(path));
                filters.insert(TestFilter::class(get_cc_filter(
                    &class_info,
                    class_name.unwrap_or("*"),
                    methods,
                )));
            } else if is_java_file(path) {
                let full_class_name = get_fully_qualified_class_name(path)?;
                filters.insert(TestFilter::new(
                    full_class_name,
                    get_java_method_filters(path, methods),
                ));
            } else if is_cc_file(path) {
                let class_info = get_cc_class_info(&read_source(path));
                if class_info.is_empty() {
                    return Err(format!("Can't find CC class in {path}"));
                }
                for class_name in class_info.keys() {
                    filters.insert(TestFilter::class(get_cc_filter(
                        &class_info,
                        class_name,
                        methods,
                    )));
                }
            }
        } else if let Some(class_name) = class_name {
            filters.insert(TestFilter::new(class_name, methods.iter().cloned()));
        } else if path.is_dir()
            && rel_module_dir
                != rel_to_root(self.build_top(), path)
                    .as_ref()
                    .map(|rel| rel.as_str())
        {
            let mut entries: Vec<Utf8PathBuf> = path
                .read_dir_utf8()
                .map(|entries| {
                    entries
                        .filter_map(Result::ok)
                        .map(|entry| entry.into_path())
                        .collect()
                })
                .unwrap_or_default();
            entries.sort();
            for entry in entries.iter().filter(|entry| is_java_file(entry)) {
                if let Some(package) = get_package_name(entry) {
                    if !methods.is_empty() {
                        return Err(format!(
                            "{}: Method filtering requires class",
                            methods.iter().join(",")
                        ));
                    }
                    filters.insert(TestFilter::class(package));
                    break;
                }
            }
        }
        debug!(
            "test filters for {path}: {}",
            filters.iter().map(|f| f.to_string()).join(", ")
        );
        Ok(filters)
    }

    fn get_test_infos(
        &self,
        test_path: &Utf8Path,
        rel_config: Option<&str>,
        module_name: Option<&str>,
        filters: BTreeSet<TestFilter>,
    ) -> Vec<TestInfo> {
        let rel_config = match rel_config {
            Some(rel_config) => rel_config.to_owned(),
            None => {
                let dir = if test_path.is_dir() {
                    test_path
                } else {
                    test_path.parent().unwrap_or(test_path)
                };
                let Some(module_dir) = self.find_parent_module_dir(dir) else {
                    return Vec::new();
                };
                format!("{module_dir}/{MODULE_CONFIG}")
            }
        };

        let module_names: BTreeSet<String> = match module_name {
            Some(module_name) => [module_name.to_owned()].into_iter().collect(),
            None => self.determine_modules_to_test(parent_dir(&rel_config), test_path),
        };

        let mut infos = Vec::new();
        for module_name in &module_names {
            for rel_config in self.get_module_test_config(module_name, Some(&rel_config)) {
                let test = TestInfo::new(
                    module_name.as_str(),
                    RunnerKind::Tradefed.name(),
                    Vec::<String>::new(),
                )
                .with_filters(filters.iter().cloned())
                .with_rel_config(rel_config);
                infos.extend(self.process_test_info(test));
            }
        }
        infos
    }

    /// Returns the testable modules in `rel_dir`, plus those listing `test_path` as a source.
    fn determine_modules_to_test(&self, rel_dir: &str, test_path: &Utf8Path) -> BTreeSet<String> {
        let mut modules = BTreeSet::new();
        if test_path.is_file()
            && !test_path
                .file_name()
                .is_some_and(|name| BUILD_FILES.contains(&name))
        {
            if let Some(rel_file) = rel_to_root(self.build_top(), test_path) {
                modules.extend(self.module_info.get_modules_by_src(rel_file.as_str()));
            }
        }
        modules.extend(self.module_info.get_modules_by_path(rel_dir));
        modules
    }

    /// Walks up from `start_dir` to the build top, looking for the directory of the module that
    /// owns it.
    ///
    /// A directory qualifies if it has an `AndroidTest.xml` and modules, or a module with a test
    /// config or a legacy Robolectric module. A module with an auto-generated config is the
    /// fallback.
    fn find_parent_module_dir(&self, start_dir: &Utf8Path) -> Option<String> {
        let build_top = self.build_top();
        let mut auto_gen_dir = None;
        let mut current = start_dir;
        while current != build_top {
            let rel_dir = rel_to_root(build_top, current)?;
            let rel_dir = rel_dir.as_str();
            if current.join(MODULE_CONFIG).is_file()
                && !self.module_info.get_module_names(rel_dir).is_empty()
            {
                return Some(rel_dir.to_owned());
            }
            for record in self.module_info.modules_in_path(rel_dir) {
                if self.module_info.robolectric_type(&record.module_name)
                    == Some(RobolectricType::Legacy)
                {
                    return Some(rel_dir.to_owned());
                }
                if record.test_config.iter().any(|config| !config.is_empty()) {
                    return Some(rel_dir.to_owned());
                }
                if record.auto_test_config.first().copied().unwrap_or(false) {
                    auto_gen_dir.get_or_insert_with(|| rel_dir.to_owned());
                }
            }
            current = current.parent()?;
        }
        auto_gen_dir
    }
}

/// Returns the host unit tests under `rel_path`, or all of them if `rel_path` is `.`.
pub fn find_host_unit_tests(module_info: &ModuleInfo, rel_path: &str) -> Vec<String> {
    debug!("finding host unit tests under {rel_path}");
    let all = module_info.get_all_host_unit_tests();
    if rel_path == "." {
        return all;
    }
    all.into_iter()
        .filter(|name| {
            module_info
                .get_paths(name)
                .iter()
                .any(|path| path.starts_with(rel_path))
        })
        .collect()
}

/// Returns the modules a test config installs or pushes, plus harness jars it needs.
fn get_targets_from_xml(xml_file: &Utf8Path, module_info: &ModuleInfo) -> BTreeSet<String> {
    let Ok(contents) = fs::read_to_string(xml_file) else {
        return BTreeSet::new();
    };

    let mut targets = BTreeSet::new();
    for tag in OPTION_TAG_RE.find_iter(&contents) {
        let attrs: BTreeMap<&str, &str> = XML_ATTR_RE
            .captures_iter(tag.as_str())
            .filter_map(|c| Some((c.name("key")?.as_str(), c.name("value")?.as_str())))
            .collect();
        let name = attrs.get("name").map_or("", |n| n.trim());
        let value = attrs.get("value").map_or("", |v| v.trim());

        let target = if APK_RE.is_match(value) || (name == "push" && value.ends_with(".apk")) {
            let apk = value.split("->").next().unwrap_or(value).trim();
            Some(apk.strip_suffix(".apk").unwrap_or(apk).to_owned())
        } else if value.contains(PERF_SETUP_LABEL) {
            Some(PERF_SETUP_TARGET.to_owned())
        } else {
            None
        };
        match target {
            Some(target) if module_info.is_module(&target) => {
                targets.insert(target);
            }
            Some(target) => {
                debug!("build target ({target}) not present in module info, skipping build");
            }
            None => {}
        }
    }

    for captures in CLASS_ATTR_RE.captures_iter(&contents) {
        let fqcn = captures["class"].trim();
        if fqcn.starts_with(COMPATIBILITY_PACKAGE_PREFIX) {
            targets.insert(CTS_JAR.to_owned());
        }
        if DALVIK_TESTRUNNER_JAR_CLASSES.contains(&fqcn) {
            targets.extend(
                DALVIK_TEST_DEPS
                    .iter()
                    .filter(|dep| module_info.is_module(dep))
                    .map(|dep| (*dep).to_owned()),
            );
        }
    }
    debug!("targets found in {xml_file}: {targets:?}");
    targets
}

fn read_source(path: &Utf8Path) -> String {
    fs::read_to_string(path)
        .inspect_err(|error| debug!("unable to read {path}: {error}"))
        .unwrap_or_default()
}

fn parent_dir(rel_path: &str) -> &str {
    rel_path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

fn with_methods(name: &str, methods: &str) -> String {
    if methods.is_empty() {
        name.to_owned()
    } else {
        format!("{name}#{methods}")
    }
}
