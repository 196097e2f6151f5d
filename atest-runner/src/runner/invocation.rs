// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ResultReporter, TestRunner};
use crate::{errors::DisplayErrorChain, options::ExtraArgs, test_info::TestInfo};
use atest_metadata::AtestExitCode;
use std::{collections::BTreeSet, fs, time::Instant};
use tracing::{debug, error};

const EARLY_EXIT_SIGNAL: &str = "INSTRUMENTATION_RESULT: shortMsg=Process crashed";
const EARLY_EXIT_MESSAGE: &str =
    "Test failed because instrumentation process died. Please check your device logs.";

/// One runner together with the tests it runs.
#[derive(Debug)]
pub struct TestRunnerInvocation<'a> {
    runner: Box<dyn TestRunner + 'a>,
    extra_args: ExtraArgs,
    tests: Vec<TestInfo>,
}

impl<'a> TestRunnerInvocation<'a> {
    /// Creates a new invocation.
    pub fn new(runner: Box<dyn TestRunner + 'a>, extra_args: ExtraArgs, tests: Vec<TestInfo>) -> Self {
        Self {
            runner,
            extra_args,
            tests,
        }
    }

    /// The runner's name.
    pub fn runner_name(&self) -> &'static str {
        self.runner.name()
    }

    /// The tests this invocation runs.
    pub fn tests(&self) -> &[TestInfo] {
        &self.tests
    }

    /// Returns true if the device must be synced before running.
    pub fn requires_device_update(&self) -> bool {
        self.runner.requires_device_update(&self.tests)
    }

    /// The build targets needed to run.
    pub fn test_runner_reqs(&self) -> BTreeSet<String> {
        self.runner.test_runner_build_reqs(&self.tests)
    }

    /// The commands that would run, for `--dry-run`.
    pub fn run_commands(&self) -> Vec<String> {
        self.runner.generate_run_commands(&self.tests, &self.extra_args)
    }

    /// Runs every test, returning the exit code.
    ///
    /// A runner error is reported to `reporter` as a failure of the whole runner and turned into
    /// [`AtestExitCode::TEST_FAILURE`].
    pub fn run_all_tests(&self, reporter: &mut dyn ResultReporter) -> i32 {
        let name = self.runner.name();
        let start = Instant::now();
        let result = self
            .runner
            .host_env_check()
            .and_then(|()| self.runner.run_tests(&self.tests, &self.extra_args, reporter));

        let exit_code = match result {
            Ok(exit_code) => {
                reporter.runner_finished(name, &self.tests, exit_code);
                exit_code
            }
            Err(err) => {
                let message = if self.log_shows_early_exit() {
                    EARLY_EXIT_MESSAGE.to_owned()
                } else {
                    DisplayErrorChain::new(&err).to_string()
                };
                error!("{name} failed: {message}");
                reporter.runner_failure(name, &self.tests, &message);
                AtestExitCode::TEST_FAILURE
            }
        };

        debug!(
            event = "RunnerFinished",
            runner = name,
            duration_ms = start.elapsed().as_millis() as u64,
            success = exit_code == AtestExitCode::SUCCESS,
        );
        exit_code
    }

    fn log_shows_early_exit(&self) -> bool {
        self.runner
            .log_file()
            .and_then(|path| fs::read_to_string(path).ok())
            .is_some_and(|contents| contents.contains(EARLY_EXIT_SIGNAL))
    }
}
