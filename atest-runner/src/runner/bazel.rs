// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ResultReporter, RunnerKind, TestRunner, run_commands};
use crate::{
    errors::RunnerError,
    module_info::ModuleInfo,
    options::ExtraArgs,
    test_info::{ExecMode, TestInfo},
};
use std::collections::BTreeSet;
use tracing::warn;

/// Runs unit tests through `bazel test`.
#[derive(Debug)]
pub struct BazelRunner<'a> {
    module_info: &'a ModuleInfo,
}

impl<'a> BazelRunner<'a> {
    /// Creates a new runner.
    pub fn new(module_info: &'a ModuleInfo) -> Self {
        Self { module_info }
    }

    /// The Bazel target for `test`, or `None` if its module has no path.
    pub fn target(&self, test: &TestInfo, extra_args: &ExtraArgs) -> Option<String> {
        let path = self.module_info.get_paths(&test.raw_test_name).first()?;
        let variant = if extra_args.host || test.supported_exec_mode() == ExecMode::Deviceless {
            "host"
        } else {
            "device"
        };
        Some(format!(
            "//{}:{}_{variant}",
            path.trim_matches('/'),
            test.raw_test_name
        ))
    }
}

impl TestRunner for BazelRunner<'_> {
    fn name(&self) -> &'static str {
        RunnerKind::Bazel.name()
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        _reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        run_commands(
            &self.generate_run_commands(tests, extra_args),
            Some(self.module_info.build_top()),
            None,
        )
    }

    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        tests
            .iter()
            .filter_map(|test| match self.target(test, extra_args) {
                Some(target) => Some(format!("bazel test {target}")),
                None => {
                    warn!("{} has no module path, skipping it", test.test_name);
                    None
                }
            })
            .collect()
    }

    fn test_runner_build_reqs(&self, _tests: &[TestInfo]) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn requires_device_update(&self, _tests: &[TestInfo]) -> bool {
        false
    }
}
