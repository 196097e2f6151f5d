// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Translates the references given on the command line into [`TestInfo`]s.
//!
//! Each reference goes through the finder chain for its shape. The first finder that produces
//! tests wins. References that can't be resolved fall back to a fuzzy search over module names.

use crate::{
    cache::TestInfoCache,
    config::AtestConfig,
    errors::{MixedFilterError, TranslateError},
    filter_types::mixed_type_filter_modules,
    finder::{FindOutcome, FinderMethod, FinderRegistry, find_host_unit_tests, is_cacheable},
    helpers::{has_wildcard, plural, rel_path_join},
    module_info::ModuleInfo,
    options::{RoboleafMode, RunOptions},
    runner::RoboleafModuleMap,
    test_identifier::TestIdentifier,
    test_info::TestInfo,
    test_mapping::{TestDetail, TestMappingSearch, parse_test_mapping_reference},
};
use camino::{Utf8Path, Utf8PathBuf};
use globset::GlobBuilder;
use itertools::Itertools;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    time::Instant,
};
use swrite::{SWrite, swrite};
use tracing::{debug, error, info, warn};

/// Characters that make a reference precise enough that guessing is pointless.
const NON_FUZZY_CHARS: [char; 3] = ['#', ':', '/'];

/// Asks the user a yes/no question.
pub trait Prompter: fmt::Debug {
    /// Asks `prompt`, returning `default` if the user just presses enter.
    fn confirm(&self, prompt: &str, default: bool) -> bool;
}

/// Per-run settings for resolving references.
#[derive(Debug, Default)]
struct Resolution {
    fuzzy_search: bool,
    roboleaf_tests: BTreeMap<String, TestInfo>,
}

/// The outcome of resolving one reference.
#[derive(Debug, Default)]
struct Resolved {
    test_infos: BTreeSet<TestInfo>,
    /// The message of the last finder that failed with a discovery error, if any.
    discovery_error: Option<String>,
}

impl Resolved {
    /// Returns the tests, warning with the discovery error if nothing was found.
    fn into_test_infos(self) -> BTreeSet<TestInfo> {
        if self.test_infos.is_empty() {
            if let Some(message) = &self.discovery_error {
                warn!("{message}\n");
            }
        }
        self.test_infos
    }
}

/// Turns command-line references into the set of tests to run.
#[derive(Debug)]
pub struct CliTranslator<'a> {
    registry: &'a dyn FinderRegistry,
    module_info: &'a ModuleInfo,
    cache: &'a TestInfoCache,
    config: &'a AtestConfig,
    prompter: &'a dyn Prompter,
    roboleaf: Option<&'a RoboleafModuleMap>,
    cwd: Utf8PathBuf,
}

impl<'a> CliTranslator<'a> {
    /// Creates a translator. `cwd` is the absolute directory the command was run from.
    pub fn new(
        registry: &'a dyn FinderRegistry,
        module_info: &'a ModuleInfo,
        cache: &'a TestInfoCache,
        config: &'a AtestConfig,
        prompter: &'a dyn Prompter,
        cwd: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            registry,
            module_info,
            cache,
            config,
            prompter,
            roboleaf: None,
            cwd: cwd.into(),
        }
    }

    /// Sets the converted-module map used when roboleaf mode is on.
    pub fn with_roboleaf(mut self, roboleaf: &'a RoboleafModuleMap) -> Self {
        self.roboleaf = Some(roboleaf);
        self
    }

    /// The working directory relative to the build top, or `.` at the top itself.
    fn rel_cwd(&self) -> String {
        match self.cwd.strip_prefix(self.module_info.build_top()) {
            Ok(rel) if !rel.as_str().is_empty() => rel.to_string(),
            _ => ".".to_owned(),
        }
    }

    /// Translates `options` into the tests to run.
    pub fn translate(&self, options: &RunOptions) -> Result<BTreeSet<TestInfo>, TranslateError> {
        let start = Instant::now();
        let is_test_mapping = options.is_test_mapping();
        let mut resolution = Resolution {
            fuzzy_search: self.config.fuzzy.enabled
                && options.fuzzy_search
                && !options.tests.is_empty()
                && !is_test_mapping,
            ..Default::default()
        };

        let host_unit_tests = if options.tests.is_empty() && !options.test_mapping {
            debug!("Finding Host Unit Tests...");
            let found = find_host_unit_tests(self.module_info, &self.rel_cwd());
            debug!("found host unit tests: {found:?}");
            found
        } else {
            Vec::new()
        };

        let (mut tests, details) = if is_test_mapping {
            let details = self.test_mapping_tests(options, host_unit_tests.is_empty())?;
            let names = details.iter().map(|detail| detail.name.clone()).collect();
            (names, Some(details))
        } else {
            (options.tests.clone(), None)
        };

        info!(target: "atest::no_heading", "\nFinding Tests...");
        debug!("finding tests: {tests:?}");
        if options.clear_cache {
            self.cache
                .clear(&tests.iter().chain(&host_unit_tests).collect::<Vec<_>>());
        }
        // TEST_MAPPING names are taken literally so that they stay aligned with their details.
        if details.is_none() && tests.iter().any(|test| has_wildcard(test)) {
            tests = self.extract_testable_modules_by_wildcard(&tests);
        }
        if let Some(roboleaf) = self.roboleaf {
            if options.roboleaf_mode != RoboleafMode::Off {
                resolution.roboleaf_tests =
                    roboleaf.are_all_tests_supported(options.roboleaf_mode, tests.as_slice());
            }
        }

        let mut test_infos = BTreeSet::new();
        let mut unresolved = Vec::new();
        for (index, test) in tests.iter().enumerate() {
            let detail = details.as_ref().and_then(|details| details.get(index));
            let found = self.resolve(test, detail, &resolution).into_test_infos();
            if found.is_empty() {
                unresolved.push(test.clone());
            }
            test_infos.extend(found);
        }
        let host_resolution = Resolution::default();
        for test in &host_unit_tests {
            let detail = TestDetail::new(test.as_str(), true);
            test_infos.extend(
                self.resolve(test, Some(&detail), &host_resolution)
                    .into_test_infos(),
            );
        }

        let mixed = mixed_type_filter_modules(&test_infos);
        if !mixed.is_empty() {
            return Err(MixedFilterError::new(mixed).into());
        }
        if test_infos.is_empty() {
            return Err(TranslateError::TestsNotFound {
                references: unresolved,
            });
        }

        debug!(
            "found {} {} in {:?}",
            test_infos.len(),
            plural::tests_str(test_infos.len()),
            start.elapsed()
        );
        for test_info in &test_infos {
            debug!("{test_info:?}");
        }
        if !options.bazel_mode {
            let all_host_unit_tests = self.module_info.get_all_host_unit_tests();
            if !host_unit_tests.is_empty()
                || tests.iter().any(|test| all_host_unit_tests.contains(test))
            {
                warn!("It is recommended to run host unit tests with --bazel-mode.");
            }
        }
        Ok(test_infos)
    }

    /// Resolves a single reference through its finder chain, with fuzzy search as configured.
    ///
    /// `detail` is set when the reference comes from a TEST_MAPPING file. Such results aren't
    /// cached.
    pub fn find_test_infos(
        &self,
        test_ref: &str,
        detail: Option<&TestDetail>,
    ) -> BTreeSet<TestInfo> {
        let resolution = Resolution {
            fuzzy_search: self.config.fuzzy.enabled && detail.is_none(),
            ..Default::default()
        };
        self.resolve(test_ref, detail, &resolution).into_test_infos()
    }

    fn resolve(
        &self,
        test_ref: &str,
        detail: Option<&TestDetail>,
        resolution: &Resolution,
    ) -> Resolved {
        let identifier = TestIdentifier::parse(test_ref);
        if let Err(err) = identifier.check(self.module_info) {
            error!("{err}");
            return Resolved::default();
        }
        if let Some(test_info) = resolution.roboleaf_tests.get(test_ref) {
            info!("Found '{test_ref}' as ROBOLEAF_CONVERTED_MODULE");
            return Resolved {
                test_infos: BTreeSet::from([test_info.clone()]),
                discovery_error: None,
            };
        }

        let mut test_infos = BTreeSet::new();
        let mut last_error = None;
        for finder in self.registry.finders_for(test_ref) {
            let found = match finder.find(&identifier.test_name) {
                FindOutcome::Found(found) => found,
                FindOutcome::NotFound => continue,
                FindOutcome::DiscoveryError(message) => {
                    debug!("{} failed for {test_ref}: {message}", finder.finder_info());
                    last_error = Some(message);
                    continue;
                }
            };
            for mut test_info in found {
                let deps = self
                    .module_info
                    .get_install_module_dependency(&test_info.test_name);
                debug!("({}) test dependencies: {deps:?}", test_info.test_name);
                if let Some(detail) = detail {
                    test_info.data.module_args = detail.options.clone();
                    test_info.from_test_mapping = true;
                    test_info.host = detail.host;
                }
                if !finder.is_cache() {
                    test_info.test_finder = finder.finder_info().to_owned();
                }
                if identifier.is_mainline() {
                    test_info.test_name = test_ref.to_owned();
                    test_info.raw_test_name = identifier.test_name.clone();
                    for module in &identifier.module_names {
                        test_info.add_mainline_module(module);
                    }
                }
                for dep in deps {
                    if self.module_info.is_module(&dep) {
                        test_info.add_build_target(dep);
                    }
                }
                test_infos.insert(test_info);
            }
            info!("Found '{test_ref}' as {}", finder.finder_info());
            break;
        }

        if test_infos.is_empty() {
            warn!("No test found for: {test_ref}");
            if resolution.fuzzy_search {
                test_infos = self.fuzzy_search(test_ref);
            }
        }

        let cacheable = test_infos
            .iter()
            .all(|test_info| is_cacheable(self.module_info, test_info));
        if !cacheable {
            debug!("not caching {test_ref}: not every result is a module");
        }
        if !test_infos.is_empty() && detail.is_none() && cacheable {
            self.cache.save(test_ref, &test_infos);
            if self.cache.root().is_some() {
                info!(
                    "(Test info has been cached for speeding up the next run, if test info needs \
                     to be updated, please add -c to clean the old cache.)"
                );
            }
        }
        Resolved {
            test_infos,
            discovery_error: last_error,
        }
    }

    /// Guesses module names close to `test_ref`.
    ///
    /// A single candidate is offered to the user; several are listed and nothing is returned.
    fn fuzzy_search(&self, test_ref: &str) -> BTreeSet<TestInfo> {
        if test_ref.contains(NON_FUZZY_CHARS) {
            return BTreeSet::new();
        }
        let fuzzy = &self.config.fuzzy;
        let module_finder = self.registry.module_finder();
        let results = module_finder.fuzzy_search(test_ref, fuzzy.costs, fuzzy.ld_range);
        match results.as_slice() {
            [] => info!("No matching result for {test_ref}."),
            [only] => {
                if self.prompter.confirm(&format!("Did you mean {only}?"), true) {
                    match module_finder.find_test_by_module_name(only) {
                        Ok(found) if !found.is_empty() => {
                            return found
                                .into_iter()
                                .map(|mut test_info| {
                                    test_info.test_finder =
                                        FinderMethod::Module.name().to_owned();
                                    test_info
                                })
                                .collect();
                        }
                        Ok(_) => {}
                        Err(message) => debug!("fuzzy match {only} failed: {message}"),
                    }
                }
            }
            _ => {
                info!(
                    "Did you mean the following modules?\n{}",
                    results.iter().take(fuzzy.max_suggestions).join("\n")
                );
            }
        }
        BTreeSet::new()
    }

    /// Expands references with `*` or `?` into the testable modules they match.
    fn extract_testable_modules_by_wildcard(&self, user_input: &[String]) -> Vec<String> {
        let testable = self.module_info.get_testable_modules(None);
        let mut extracted = Vec::new();
        for test in user_input {
            if !has_wildcard(test) {
                extracted.push(test.clone());
                continue;
            }
            match GlobBuilder::new(test).literal_separator(false).build() {
                Ok(glob) => {
                    let matcher = glob.compile_matcher();
                    extracted.extend(
                        testable
                            .iter()
                            .filter(|module| matcher.is_match(module.as_str()))
                            .cloned(),
                    );
                }
                Err(err) => {
                    warn!("ignoring invalid wildcard reference `{test}`: {err}");
                    extracted.push(test.clone());
                }
            }
        }
        extracted
    }

    /// Finds the tests in the TEST_MAPPING files that apply to this run.
    ///
    /// An empty result is an error unless `required` is false, i.e. other tests will run anyway.
    fn test_mapping_tests(
        &self,
        options: &RunOptions,
        required: bool,
    ) -> Result<Vec<TestDetail>, TranslateError> {
        let (src_path, groups) = parse_test_mapping_reference(
            options.tests.first().map(String::as_str),
            &self.config.test_mapping.default_groups,
        )?;
        let path = if src_path.is_empty() {
            self.cwd.clone()
        } else {
            rel_path_join(&self.cwd, Utf8Path::new(&src_path))
        };

        let found = TestMappingSearch::new(self.module_info, &self.config.test_mapping.suites)
            .include_subdirs(options.include_subdirs)
            .find_tests(&path, &groups)?;
        if found.tests.is_empty() && required {
            warn!(
                "No tests of group `{}` found in {path}/TEST_MAPPING or its parent directories. \
                 (Available groups: {})\n\
                 You might be missing atest arguments, try `atest --help` for more information.",
                groups.join(", "),
                found.all_tests.keys().join(", "),
            );
            if !found.all_tests.is_empty() {
                let mut listing = String::new();
                for (group, tests) in &found.all_tests {
                    swrite!(listing, "{group}:\n");
                    for test in tests {
                        swrite!(listing, "\t{test}\n");
                    }
                }
                warn!("All available tests in TEST_MAPPING files are:\n{listing}");
            }
            return Err(TranslateError::NoTestMappingTests {
                groups,
                available: found.all_tests.into_keys().collect(),
            });
        }

        debug!("test details:\n{}", found.tests.iter().join("\n"));
        Ok(found.tests.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        finder::{Finder, FinderContext, ModuleFinder},
        module_info::ModuleRecord,
        test_info::TestFilter,
    };
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use std::{
        cell::{Cell, RefCell},
        fs,
        rc::Rc,
    };

    #[derive(Debug)]
    struct ScriptedPrompter {
        answer: bool,
        asked: RefCell<Vec<String>>,
    }

    impl ScriptedPrompter {
        fn new(answer: bool) -> Self {
            Self {
                answer,
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    impl Prompter for ScriptedPrompter {
        fn confirm(&self, prompt: &str, _default: bool) -> bool {
            self.asked.borrow_mut().push(prompt.to_owned());
            self.answer
        }
    }

    #[derive(Debug)]
    struct StubFinder {
        name: &'static str,
        outcome: FindOutcome,
        calls: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Finder for StubFinder {
        fn finder_info(&self) -> &str {
            self.name
        }

        fn find(&self, _test_name: &str) -> FindOutcome {
            self.calls.borrow_mut().push(self.name);
            self.outcome.clone()
        }
    }

    /// Hands out a fixed chain for every reference, delegating fuzzy search to a real context.
    #[derive(Debug)]
    struct StubRegistry<'a> {
        ctx: FinderContext<'a>,
        chain: Vec<(&'static str, FindOutcome)>,
        calls: Rc<RefCell<Vec<&'static str>>>,
        lookups: Cell<usize>,
    }

    impl<'a> StubRegistry<'a> {
        fn new(ctx: FinderContext<'a>, chain: Vec<(&'static str, FindOutcome)>) -> Self {
            Self {
                ctx,
                chain,
                calls: Rc::new(RefCell::new(Vec::new())),
                lookups: Cell::new(0),
            }
        }
    }

    impl FinderRegistry for StubRegistry<'_> {
        fn finders_for<'s>(&'s self, _test_ref: &str) -> Vec<Box<dyn Finder + 's>> {
            self.lookups.set(self.lookups.get() + 1);
            self.chain
                .iter()
                .map(|(name, outcome)| -> Box<dyn Finder + 's> {
                    Box::new(StubFinder {
                        name: *name,
                        outcome: outcome.clone(),
                        calls: self.calls.clone(),
                    })
                })
                .collect()
        }

        fn module_finder(&self) -> &ModuleFinder<'_> {
            self.ctx.module_finder()
        }
    }

    struct Tree {
        _dir: Utf8TempDir,
        module_info: ModuleInfo,
        config: AtestConfig,
    }

    impl Tree {
        fn root(&self) -> &Utf8Path {
            self.module_info.build_top()
        }
    }

    fn tree() -> Tree {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let root = dir.path().canonicalize_utf8().expect("canonicalized temp dir");

        let mut hello = ModuleRecord::new("hello_world_test", "platform_testing/tests/example/native");
        hello.installed = vec!["out/target/product/x/data/nativetest64/hello_world_test".to_owned()];
        hello.auto_test_config = vec![true];
        hello.class = vec!["NATIVE_TESTS".to_owned()];
        hello.compatibility_suites = vec!["general-tests".to_owned()];
        hello.dependencies = vec!["libhello".to_owned(), "not_a_module".to_owned()];

        let libhello = ModuleRecord::new("libhello", "platform_testing/tests/example/native/lib");

        let mut host_unit = ModuleRecord::new("host_unit_test", "tools/host_unit");
        host_unit.installed = vec!["out/host/linux-x86/testcases/host_unit_test".to_owned()];
        host_unit.auto_test_config = vec![true];
        host_unit.is_unit_test = "true".to_owned();
        host_unit.supported_variants = vec!["HOST".to_owned()];

        let module_info = ModuleInfo::from_records([hello, libhello, host_unit]).with_build_top(&root);
        Tree {
            _dir: dir,
            module_info,
            config: AtestConfig::default_config().expect("default config is valid"),
        }
    }

    fn stub_info(name: &str) -> TestInfo {
        TestInfo::new(name, "AtestTradefedTestRunner", [name])
    }

    #[test]
    fn first_successful_finder_wins() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![
                ("CACHE", FindOutcome::NotFound),
                ("MODULE", FindOutcome::DiscoveryError("module is broken".to_owned())),
                ("INTEGRATION", FindOutcome::Found(vec![stub_info("hello_world_test")])),
                ("CONFIG", FindOutcome::Found(vec![stub_info("other")])),
            ],
        );
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );

        let found = translator.find_test_infos("hello_world_test", None);
        assert_eq!(*registry.calls.borrow(), ["CACHE", "MODULE", "INTEGRATION"]);
        let [info]: [TestInfo; 1] = found
            .into_iter()
            .collect::<Vec<_>>()
            .try_into()
            .expect("exactly one test");
        assert_eq!(info.test_finder, "INTEGRATION");
        assert!(info.build_targets.contains("libhello"));
        assert!(!info.build_targets.contains("not_a_module"));
        assert!(prompter.asked.borrow().is_empty());
    }

    #[test]
    fn cache_hits_keep_their_finder() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let mut cached = stub_info("hello_world_test");
        cached.test_finder = "MODULE".to_owned();
        let registry = StubRegistry::new(ctx, vec![("CACHE", FindOutcome::Found(vec![cached]))]);
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );

        let found = translator.find_test_infos("hello_world_test", None);
        assert_eq!(
            found.iter().map(|info| info.test_finder.as_str()).collect::<Vec<_>>(),
            ["MODULE"]
        );
    }

    #[test]
    fn test_mapping_details_are_attached() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![("MODULE", FindOutcome::Found(vec![stub_info("hello_world_test")]))],
        );
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );

        let mut detail = TestDetail::new("hello_world_test", true);
        detail.options = vec![("include-filter".to_owned(), "Hello.World".to_owned())];
        let found = translator.find_test_infos("hello_world_test", Some(&detail));
        let info = found.first().expect("one test");
        assert!(info.from_test_mapping);
        assert!(info.host);
        assert_eq!(info.data.module_args, detail.options);
    }

    #[test]
    fn last_discovery_error_is_reported() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![
                ("MODULE", FindOutcome::DiscoveryError("a".to_owned())),
                ("INTEGRATION", FindOutcome::DiscoveryError("b".to_owned())),
            ],
        );
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        let resolution = Resolution {
            fuzzy_search: true,
            ..Default::default()
        };

        let resolved = translator.resolve("zzz_unknown", None, &resolution);
        assert_eq!(*registry.calls.borrow(), ["MODULE", "INTEGRATION"]);
        assert!(resolved.test_infos.is_empty());
        assert_eq!(resolved.discovery_error.as_deref(), Some("b"));
        assert!(prompter.asked.borrow().is_empty(), "nothing is close enough to offer");
    }

    #[test]
    fn uncacheable_results_are_not_saved() {
        let tree = tree();
        let cache_dir = camino_tempfile::tempdir().expect("created cache dir");
        let cache = TestInfoCache::new(cache_dir.path(), "normal", "main", "aosp_x86_64-userdebug");
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![
                ("CACHE", FindOutcome::NotFound),
                ("MODULE", FindOutcome::Found(vec![stub_info("hello_world_test")])),
            ],
        );
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );

        let detail = TestDetail::new("hello_world_test", false);
        let found = translator.find_test_infos("hello_world_test", Some(&detail));
        assert_eq!(found.len(), 1);
        let cache_path = cache.cache_path("hello_world_test").expect("cache is enabled");
        assert!(!cache_path.exists(), "TEST_MAPPING results aren't cached");

        let registry = StubRegistry::new(
            FinderContext::new(&tree.module_info, &cache, None, tree.root()),
            vec![("SUITE_PLAN", FindOutcome::Found(vec![stub_info("cts")]))],
        );
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        assert_eq!(translator.find_test_infos("cts", None).len(), 1);
        let cache_path = cache.cache_path("cts").expect("cache is enabled");
        assert!(!cache_path.exists(), "results that aren't modules aren't cached");

        let registry = StubRegistry::new(
            FinderContext::new(&tree.module_info, &cache, None, tree.root()),
            vec![("MODULE", FindOutcome::Found(vec![stub_info("hello_world_test")]))],
        );
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        translator.find_test_infos("hello_world_test", None);
        assert!(
            cache.cache_path("hello_world_test").expect("cache is enabled").exists(),
            "module results given directly are cached"
        );
    }

    #[test]
    fn invalid_mainline_reference_skips_the_chain() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![("MODULE", FindOutcome::Found(vec![stub_info("hello_world_test")]))],
        );
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );

        assert!(translator.find_test_infos("hello_world_test[missing.apex]", None).is_empty());
        assert_eq!(registry.lookups.get(), 0);
    }

    #[test]
    fn fuzzy_single_match_is_confirmed() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(ctx, vec![("MODULE", FindOutcome::NotFound)]);

        let yes = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &yes,
            tree.root(),
        );
        let found = translator.find_test_infos("hello_world_tst", None);
        assert_eq!(*yes.asked.borrow(), ["Did you mean hello_world_test?"]);
        assert_eq!(
            found.iter().map(|info| info.test_name.as_str()).collect::<Vec<_>>(),
            ["hello_world_test"]
        );

        let no = ScriptedPrompter::new(false);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &no,
            tree.root(),
        );
        assert!(translator.find_test_infos("hello_world_tst", None).is_empty());
        assert!(
            translator.find_test_infos("a/hello_world_tst", None).is_empty(),
            "paths are never guessed"
        );
        assert_eq!(no.asked.borrow().len(), 1);
    }

    #[test]
    fn hello_world_end_to_end() {
        let tree = tree();
        let cache_dir = camino_tempfile::tempdir().expect("created cache dir");
        let cache = TestInfoCache::new(cache_dir.path(), "normal", "main", "aosp_x86_64-userdebug");
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let prompter = ScriptedPrompter::new(true);
        let translator = CliTranslator::new(
            &ctx,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        let options = RunOptions {
            tests: vec!["hello_world_test".to_owned()],
            ..Default::default()
        };

        let infos = translator.translate(&options).expect("hello_world_test resolves");
        let info = infos.first().expect("one test");
        assert_eq!(infos.len(), 1);
        assert_eq!(info.test_name, "hello_world_test");
        assert_eq!(info.test_runner, "AtestTradefedTestRunner");
        assert_eq!(info.test_finder, "MODULE");
        assert_eq!(
            info.build_targets,
            btreeset! {
                "hello_world_test".to_owned(),
                "libhello".to_owned(),
                "MODULES-IN-platform_testing-tests-example-native".to_owned(),
            }
        );
        assert_eq!(cache.load("hello_world_test"), Some(infos.clone()));

        // The second run is served from the cache.
        let again = translator.translate(&options).expect("cached reference resolves");
        assert_eq!(again, infos);
    }

    #[test]
    fn unresolved_references() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let prompter = ScriptedPrompter::new(false);
        let translator = CliTranslator::new(
            &ctx,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        let options = RunOptions {
            tests: vec!["NoSuchThing".to_owned()],
            fuzzy_search: false,
            ..Default::default()
        };
        let error = translator.translate(&options).unwrap_err();
        assert!(
            matches!(error, TranslateError::TestsNotFound { ref references } if references == &["NoSuchThing"])
        );
    }

    #[test]
    fn wildcards_expand_to_testable_modules() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let prompter = ScriptedPrompter::new(false);
        let translator = CliTranslator::new(
            &ctx,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        assert_eq!(
            translator.extract_testable_modules_by_wildcard(&[
                "*_test".to_owned(),
                "libhello".to_owned(),
                "host_unit_te?t".to_owned(),
            ]),
            ["hello_world_test", "host_unit_test", "libhello", "host_unit_test"]
        );
    }

    #[test]
    fn mixed_filters_are_rejected() {
        let tree = tree();
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, tree.root());
        let registry = StubRegistry::new(
            ctx,
            vec![(
                "CLASS",
                FindOutcome::Found(vec![
                    stub_info("hello_world_test").with_filters([TestFilter::class("Hello.*")]),
                    stub_info("hello_world_test")
                        .with_filters([TestFilter::new("Hello", ["World"])]),
                ]),
            )],
        );
        let prompter = ScriptedPrompter::new(false);
        let translator = CliTranslator::new(
            &registry,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            tree.root(),
        );
        let options = RunOptions {
            tests: vec!["Hello".to_owned()],
            ..Default::default()
        };
        let error = translator.translate(&options).unwrap_err();
        assert!(
            matches!(error, TranslateError::MixedFilter(ref err) if err.modules() == ["hello_world_test"])
        );
    }

    #[test]
    fn test_mapping_run() {
        let tree = tree();
        let project = tree.root().join("platform_testing/tests/example/native");
        fs::create_dir_all(&project).expect("created project dir");
        fs::write(
            project.join("TEST_MAPPING"),
            indoc! {r#"
                {
                  // Runs on every change.
                  "presubmit": [
                    {"name": "hello_world_test", "options": [{"include-filter": "Hello.*"}]}
                  ],
                  "postsubmit": [{"name": "host_unit_test", "host": true}]
                }
            "#},
        )
        .expect("wrote TEST_MAPPING");
        let cache = TestInfoCache::disabled();
        let ctx = FinderContext::new(&tree.module_info, &cache, None, &project);
        let prompter = ScriptedPrompter::new(false);
        let translator = CliTranslator::new(
            &ctx,
            &tree.module_info,
            &cache,
            &tree.config,
            &prompter,
            &project,
        );

        let options = RunOptions {
            test_mapping: true,
            ..Default::default()
        };
        let infos = translator.translate(&options).expect("presubmit tests resolve");
        let info = infos.first().expect("one test");
        assert_eq!(infos.len(), 1);
        assert_eq!(info.test_name, "hello_world_test");
        assert!(info.from_test_mapping);
        assert_eq!(
            info.data.module_args,
            [("include-filter".to_owned(), "Hello.*".to_owned())]
        );

        let options = RunOptions {
            tests: vec![":postsubmit".to_owned()],
            ..Default::default()
        };
        let infos = translator.translate(&options).expect("postsubmit tests resolve");
        assert!(infos.iter().all(|info| info.host && info.test_name == "host_unit_test"));

        let options = RunOptions {
            tests: vec![":mainline-presubmit".to_owned()],
            ..Default::default()
        };
        let error = translator.translate(&options).unwrap_err();
        assert!(matches!(
            error,
            TranslateError::NoTestMappingTests { ref available, .. }
                if available == &["postsubmit", "presubmit"]
        ));
    }
}
