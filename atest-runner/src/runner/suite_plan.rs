// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ResultReporter, RunnerKind, TestRunner, run_commands, test_build_targets};
use crate::{errors::RunnerError, options::ExtraArgs, test_info::TestInfo};
use std::collections::BTreeSet;
use swrite::{SWrite, swrite};
use tracing::warn;

/// Runs compatibility suite plans through the suite's own Tradefed launcher.
#[derive(Debug, Default)]
pub struct SuitePlanRunner {}

impl SuitePlanRunner {
    /// Creates a new runner.
    pub fn new() -> Self {
        Self {}
    }
}

impl TestRunner for SuitePlanRunner {
    fn name(&self) -> &'static str {
        RunnerKind::SuitePlan.name()
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        _reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        run_commands(&self.generate_run_commands(tests, extra_args), None, None)
    }

    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        tests
            .iter()
            .filter_map(|test| {
                let Some(suite) = &test.suite else {
                    warn!("{} is not a suite plan, skipping it", test.test_name);
                    return None;
                };
                let mut command = format!("{suite}-tradefed run commandAndExit {suite}");
                for serial in &extra_args.serial {
                    swrite!(command, " --serial {}", shell_words::quote(serial));
                }
                if let Some(shards) = extra_args.sharding {
                    swrite!(command, " --shard-count {shards}");
                }
                Some(command)
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
