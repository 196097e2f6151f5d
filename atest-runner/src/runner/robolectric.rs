// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ResultReporter, RunnerKind, TestRunner, run_commands, test_build_targets};
use crate::{errors::RunnerError, options::ExtraArgs, test_info::TestInfo};
use camino::Utf8PathBuf;
use itertools::Itertools;
use std::collections::BTreeSet;

/// Runs legacy Robolectric tests, which have no test config, through make.
#[derive(Debug)]
pub struct RobolectricRunner {
    build_top: Utf8PathBuf,
}

impl RobolectricRunner {
    /// Creates a runner that invokes make from `build_top`.
    pub fn new(build_top: Utf8PathBuf) -> Self {
        Self { build_top }
    }
}

impl TestRunner for RobolectricRunner {
    fn name(&self) -> &'static str {
        RunnerKind::Robolectric.name()
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        _reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        run_commands(
            &self.generate_run_commands(tests, extra_args),
            Some(&self.build_top),
            None,
        )
    }

    fn generate_run_commands(&self, tests: &[TestInfo], _extra_args: &ExtraArgs) -> Vec<String> {
        tests
            .iter()
            .map(|test| {
                let make = format!("make -j -f build/core/main.mk {}", test.raw_test_name);
                let filters = test
                    .data
                    .filters
                    .iter()
                    .flat_map(|filter| filter.to_tf_strings())
                    .join(",");
                if filters.is_empty() {
                    make
                } else {
                    format!("ROBOTEST_FILTER={} {make}", shell_words::quote(&filters))
                }
            })
            .collect()
    }

    fn test_runner_build_reqs(&self, tests: &[TestInfo]) -> BTreeSet<String> {
        test_build_targets(tests)
    }

    fn requires_device_update(&self, _tests: &[TestInfo]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_info::TestFilter;
    use pretty_assertions::assert_eq;

    #[test]
    fn filters_become_robotest_filter() {
        let runner = RobolectricRunner::new(Utf8PathBuf::from("/src"));
        let whole = TestInfo::new("RunSettingsRoboTests", "RobolectricTestRunner", ["x"]);
        let filtered = whole
            .clone()
            .with_filters([TestFilter::new("FooTest", ["testA"]), TestFilter::class("BarTest")]);
        assert_eq!(
            runner.generate_run_commands(&[whole, filtered], &ExtraArgs::default()),
            [
                "make -j -f build/core/main.mk RunSettingsRoboTests",
                "ROBOTEST_FILTER='BarTest,FooTest#testA' make -j -f build/core/main.mk \
                 RunSettingsRoboTests",
            ]
        );
    }
}
