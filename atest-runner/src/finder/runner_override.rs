// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{FindOutcome, Finder};
use crate::{module_info::ModuleInfo, runner::RunnerKind};
use std::fmt;

/// A rule that retargets the tests a finder returns to another runner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RunnerOverride {
    runner: RunnerKind,
}

impl RunnerOverride {
    /// Runs unit test modules through Bazel.
    pub fn bazel() -> Self {
        Self {
            runner: RunnerKind::Bazel,
        }
    }

    /// The runner tests are moved to.
    pub fn runner(&self) -> RunnerKind {
        self.runner
    }

    /// Wraps `inner` so that the unit tests it finds use this override's runner.
    pub fn wrap<'a>(
        &self,
        inner: Box<dyn Finder + 'a>,
        module_info: &'a ModuleInfo,
    ) -> OverriddenFinder<'a> {
        OverriddenFinder {
            inner,
            module_info,
            runner: self.runner,
        }
    }
}

/// A finder whose results pass through a [`RunnerOverride`].
pub struct OverriddenFinder<'a> {
    inner: Box<dyn Finder + 'a>,
    module_info: &'a ModuleInfo,
    runner: RunnerKind,
}

impl fmt::Debug for OverriddenFinder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverriddenFinder")
            .field("inner", &self.inner)
            .field("runner", &self.runner)
            .finish_non_exhaustive()
    }
}

impl Finder for OverriddenFinder<'_> {
    fn finder_info(&self) -> &str {
        self.inner.finder_info()
    }

    fn is_cache(&self) -> bool {
        self.inner.is_cache()
    }

    fn find(&self, test_name: &str) -> FindOutcome {
        match self.inner.find(test_name) {
            FindOutcome::Found(mut infos) => {
                for info in &mut infos {
                    let is_unit_test = self
                        .module_info
                        .get_module_info(&info.test_name)
                        .is_some_and(|record| self.module_info.is_unit_test(record));
                    if is_unit_test {
                        info.test_runner = self.runner.name().to_owned();
                    }
                }
                FindOutcome::Found(infos)
            }
            other => other,
        }
    }
}
