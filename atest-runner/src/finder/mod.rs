// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Finders turn test references into [`TestInfo`]s.
//!
//! Each reference is classified by shape (see [`reference_types`]), and the matching find methods
//! are tried in order. A [`FinderContext`] holds everything the finders need for one invocation
//! and hands out the ordered chain for a reference.

mod cache_finder;
mod cc_filter;
mod integration_finder;
mod java_filter;
mod module_finder;
mod reference_type;
mod runner_override;
mod source_index;
mod suite_plan_finder;

pub use cache_finder::{CacheFinder, is_cacheable};
pub use cc_filter::{CcClassInfo, GtestType, get_cc_class_info, get_cc_filter};
pub use integration_finder::{INTEGRATION_DIRS, IntegrationFinder};
pub use module_finder::{ModuleFinder, find_host_unit_tests};
pub use reference_type::{FinderMethod, ModuleReference, reference_types, split_methods};
pub use runner_override::{OverriddenFinder, RunnerOverride};
pub use source_index::{INDEX_FILE_NAME, IndexData, SourceIndex};
pub use suite_plan_finder::SuitePlanFinder;

use crate::{cache::TestInfoCache, module_info::ModuleInfo, test_info::TestInfo};
use camino::Utf8PathBuf;
use source_index::SourceSearch;
use std::fmt;

/// The result of a single find method.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FindOutcome {
    /// One or more tests were found.
    Found(Vec<TestInfo>),

    /// Nothing matched.
    NotFound,

    /// The reference can't be resolved this way, for a reason worth telling the user.
    DiscoveryError(String),
}

impl FindOutcome {
    /// Creates an outcome from a list of tests, which may be empty.
    pub fn from_infos(infos: Vec<TestInfo>) -> Self {
        if infos.is_empty() {
            Self::NotFound
        } else {
            Self::Found(infos)
        }
    }
}

impl From<Result<Vec<TestInfo>, String>> for FindOutcome {
    fn from(result: Result<Vec<TestInfo>, String>) -> Self {
        match result {
            Ok(infos) => Self::from_infos(infos),
            Err(message) => Self::DiscoveryError(message),
        }
    }
}

/// A strategy for resolving test references of one shape.
pub trait Finder: fmt::Debug {
    /// The name printed when this finder resolves a test, e.g. `MODULE`.
    fn finder_info(&self) -> &str;

    /// Returns true for the cache finder, whose results keep their original finder name.
    fn is_cache(&self) -> bool {
        false
    }

    /// Resolves `test_name`.
    fn find(&self, test_name: &str) -> FindOutcome;
}

/// Produces the ordered finder chain for a test reference.
pub trait FinderRegistry: fmt::Debug {
    /// Returns the finders to try for `test_ref`, in priority order.
    fn finders_for<'a>(&'a self, test_ref: &str) -> Vec<Box<dyn Finder + 'a>>;

    /// The module finder, used directly by fuzzy search.
    fn module_finder(&self) -> &ModuleFinder<'_>;
}

/// Everything finders need for one invocation.
#[derive(Debug)]
pub struct FinderContext<'a> {
    module_info: &'a ModuleInfo,
    cache: &'a TestInfoCache,
    module_finder: ModuleFinder<'a>,
    integration_finder: IntegrationFinder<'a>,
    suite_plan_finder: SuitePlanFinder<'a>,
    runner_override: Option<RunnerOverride>,
}

impl<'a> FinderContext<'a> {
    /// Creates a new context. `cwd` is the absolute directory relative references are resolved
    /// against.
    pub fn new(
        module_info: &'a ModuleInfo,
        cache: &'a TestInfoCache,
        source_index: Option<&'a SourceIndex>,
        cwd: impl Into<Utf8PathBuf>,
    ) -> Self {
        let build_top = module_info.build_top();
        let cwd = cwd.into();
        Self {
            module_info,
            cache,
            module_finder: ModuleFinder::new(
                module_info,
                SourceSearch::new(build_top, source_index),
                cwd.clone(),
            ),
            integration_finder: IntegrationFinder::new(build_top, cwd.clone()),
            suite_plan_finder: SuitePlanFinder::new(build_top, cwd),
            runner_override: None,
        }
    }

    /// Wraps every finder so that eligible tests are retargeted, e.g. to Bazel.
    pub fn with_runner_override(mut self, runner_override: RunnerOverride) -> Self {
        self.runner_override = Some(runner_override);
        self
    }
}

impl FinderRegistry for FinderContext<'_> {
    fn finders_for<'s>(&'s self, test_ref: &str) -> Vec<Box<dyn Finder + 's>> {
        reference_types(test_ref)
            .into_iter()
            .map(|method| -> Box<dyn Finder + 's> {
                let finder: Box<dyn Finder + 's> = match method {
                    FinderMethod::Cache => Box::new(CacheFinder::new(
                        self.cache,
                        self.module_info,
                        test_ref,
                    )),
                    method => Box::new(MethodFinder { method, ctx: self }),
                };
                match &self.runner_override {
                    Some(runner_override) => {
                        Box::new(runner_override.wrap(finder, self.module_info))
                    }
                    None => finder,
                }
            })
            .collect()
    }

    fn module_finder(&self) -> &ModuleFinder<'_> {
        &self.module_finder
    }
}

/// A non-cache find method bound to a context.
struct MethodFinder<'c, 'a> {
    method: FinderMethod,
    ctx: &'c FinderContext<'a>,
}

impl fmt::Debug for MethodFinder<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodFinder")
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl Finder for MethodFinder<'_, '_> {
    fn finder_info(&self) -> &str {
        self.method.name()
    }

    fn find(&self, test_name: &str) -> FindOutcome {
        let module = &self.ctx.module_finder;
        let integration = &self.ctx.integration_finder;
        let suite_plan = &self.ctx.suite_plan_finder;
        let result = match self.method {
            FinderMethod::Module | FinderMethod::MainlineModule => {
                module.find_test_by_module_name(test_name)
            }
            FinderMethod::Class | FinderMethod::QualifiedClass => {
                module.find_test_by_class_name(test_name, None, None, false)
            }
            FinderMethod::ModuleClass => module.find_test_by_module_and_class(test_name),
            FinderMethod::Package => module.find_test_by_package_name(test_name, None, None),
            FinderMethod::ModulePackage => module.find_test_by_module_and_package(test_name),
            FinderMethod::ModuleFilePath => module.find_test_by_path(test_name),
            FinderMethod::CcClass => module.find_test_by_cc_class_name(test_name, None, None),
            FinderMethod::Config => module.find_test_by_config_name(test_name),
            FinderMethod::Integration => integration.find_test_by_integration_name(test_name),
            FinderMethod::IntegrationFilePath => integration.find_int_test_by_path(test_name),
            FinderMethod::SuitePlan => suite_plan.find_test_by_suite_name(test_name),
            FinderMethod::SuitePlanFilePath => suite_plan.find_test_by_suite_path(test_name),
            // The registry never binds the cache method to a context.
            FinderMethod::Cache => Ok(Vec::new()),
        };
        result.into()
    }
}
