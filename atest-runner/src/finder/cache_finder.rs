// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{FindOutcome, Finder};
use crate::{
    cache::TestInfoCache,
    helpers::modules_in_target,
    module_info::ModuleInfo,
    test_info::TestInfo,
};
use std::collections::BTreeSet;
use tracing::debug;

const MODULES_IN_PREFIX: &str = "MODULES-IN-";

/// Returns true if `info` can be served back from the cache.
///
/// Cache hits are re-validated against the module they name, so results whose raw name isn't a
/// module (integration configs, suite plans and config files) are never stored.
pub fn is_cacheable(module_info: &ModuleInfo, info: &TestInfo) -> bool {
    module_info.is_module(&info.raw_test_name)
}

/// Serves previously resolved tests from the [`TestInfoCache`].
///
/// The cache is keyed by the full reference, including any mainline suffix, so the name passed
/// to [`Finder::find`] is ignored. Entries whose module has since disappeared or moved are misses.
#[derive(Debug)]
pub struct CacheFinder<'a> {
    cache: &'a TestInfoCache,
    module_info: &'a ModuleInfo,
    test_ref: String,
}

impl<'a> CacheFinder<'a> {
    /// Creates a cache finder for `test_ref`.
    pub fn new(
        cache: &'a TestInfoCache,
        module_info: &'a ModuleInfo,
        test_ref: impl Into<String>,
    ) -> Self {
        Self {
            cache,
            module_info,
            test_ref: test_ref.into(),
        }
    }

    fn is_valid(&self, info: &TestInfo) -> bool {
        let name = &info.raw_test_name;
        if !is_cacheable(self.module_info, info) {
            debug!("cached test {name} is no longer a module");
            return false;
        }
        let cached: BTreeSet<&str> = info
            .build_targets
            .iter()
            .filter(|target| target.starts_with(MODULES_IN_PREFIX))
            .map(String::as_str)
            .collect();
        if cached.is_empty() {
            return true;
        }
        let current: BTreeSet<String> = self
            .module_info
            .get_paths(name)
            .iter()
            .map(|path| modules_in_target(path))
            .collect();
        let current: BTreeSet<&str> = current.iter().map(String::as_str).collect();
        if cached != current {
            debug!("paths of cached test {name} have changed");
            return false;
        }
        true
    }
}

impl Finder for CacheFinder<'_> {
    fn finder_info(&self) -> &str {
        "CACHE"
    }

    fn is_cache(&self) -> bool {
        true
    }

    fn find(&self, _test_name: &str) -> FindOutcome {
        let Some(infos) = self.cache.load(&self.test_ref) else {
            return FindOutcome::NotFound;
        };
        if infos.is_empty() || !infos.iter().all(|info| self.is_valid(info)) {
            return FindOutcome::NotFound;
        }
        FindOutcome::Found(infos.into_iter().collect())
    }
}
