// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::test_info::TestInfo;
use atest_metadata::AtestExitCode;
use indexmap::IndexMap;
use std::{collections::BTreeSet, fmt};

/// How a runner's tests ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every command exited successfully.
    Passed,
    /// A command exited with a non-zero code.
    Failed {
        /// The combined exit code.
        exit_code: i32,
    },
    /// The runner itself failed before or while running tests.
    RunnerFailure {
        /// What went wrong.
        message: String,
    },
}

/// The outcome of one invocation of a runner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunnerResult {
    /// The tests that were run.
    pub tests: Vec<String>,
    /// How they ended.
    pub status: RunStatus,
}

impl RunnerResult {
    /// Returns true if the tests passed.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Passed
    }
}

/// Receives the outcome of runners. It never influences control flow.
pub trait ResultReporter {
    /// Records that `runner` doesn't report per-test results.
    fn register_unsupported_runner(&mut self, runner: &str);

    /// Records that `runner` failed as a whole.
    fn runner_failure(&mut self, runner: &str, tests: &[TestInfo], message: &str);

    /// Records that `runner` finished running `tests` with `exit_code`.
    fn runner_finished(&mut self, runner: &str, tests: &[TestInfo], exit_code: i32);

    /// The results reported for `runner`, in the order they were reported.
    fn get_test_results_by_runner(&self, runner: &str) -> &[RunnerResult];
}

/// A [`ResultReporter`] that keeps every result in memory.
#[derive(Clone, Debug, Default)]
pub struct CollectingReporter {
    results: IndexMap<String, Vec<RunnerResult>>,
    unsupported: BTreeSet<String>,
}

impl CollectingReporter {
    /// Creates an empty reporter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runners that registered as not reporting per-test results.
    pub fn unsupported_runners(&self) -> &BTreeSet<String> {
        &self.unsupported
    }

    /// Returns true if nothing failed.
    pub fn is_success(&self) -> bool {
        self.results.values().flatten().all(RunnerResult::is_success)
    }

    /// Returns a displayable summary of every result.
    pub fn summary(&self) -> ReporterSummary<'_> {
        ReporterSummary { reporter: self }
    }

    fn push(&mut self, runner: &str, tests: &[TestInfo], status: RunStatus) {
        self.results
            .entry(runner.to_owned())
            .or_default()
            .push(RunnerResult {
                tests: tests.iter().map(|test| test.test_name.clone()).collect(),
                status,
            });
    }
}

impl ResultReporter for CollectingReporter {
    fn register_unsupported_runner(&mut self, runner: &str) {
        self.unsupported.insert(runner.to_owned());
    }

    fn runner_failure(&mut self, runner: &str, tests: &[TestInfo], message: &str) {
        self.push(
            runner,
            tests,
            RunStatus::RunnerFailure {
                message: message.to_owned(),
            },
        );
    }

    fn runner_finished(&mut self, runner: &str, tests: &[TestInfo], exit_code: i32) {
        let status = if exit_code == AtestExitCode::SUCCESS {
            RunStatus::Passed
        } else {
            RunStatus::Failed { exit_code }
        };
        self.push(runner, tests, status);
    }

    fn get_test_results_by_runner(&self, runner: &str) -> &[RunnerResult] {
        self.results
            .get(runner)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// A per-runner summary of a [`CollectingReporter`].
#[derive(Debug)]
pub struct ReporterSummary<'a> {
    reporter: &'a CollectingReporter,
}

impl fmt::Display for ReporterSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Summary")?;
        writeln!(f, "-------")?;
        for (runner, results) in &self.reporter.results {
            for result in results {
                let tests = result.tests.join(", ");
                match &result.status {
                    RunStatus::Passed => writeln!(f, "{runner}: {tests}: PASSED")?,
                    RunStatus::Failed { exit_code } => {
                        writeln!(f, "{runner}: {tests}: FAILED (exit code {exit_code})")?
                    }
                    RunStatus::RunnerFailure { message } => {
                        writeln!(f, "{runner}: {tests}: RUNNER FAILURE: {message}")?
                    }
                }
            }
            if self.reporter.unsupported.contains(runner) {
                writeln!(f, "{runner}: per-test results are not available")?;
            }
        }
        Ok(())
    }
}
