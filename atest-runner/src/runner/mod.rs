// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test runners: the backends that turn resolved tests into commands and execute them.
//!
//! The set of runners is closed: every [`TestInfo`] names one of the [`RunnerKind`] variants, and
//! [`group_tests_by_test_runners`] sorts resolved tests into one group per runner. Each group
//! becomes a [`TestRunnerInvocation`].

mod bazel;
mod invocation;
mod mobly;
mod reporter;
mod roboleaf;
mod robolectric;
mod suite_plan;
mod tradefed;

pub use bazel::BazelRunner;
pub use invocation::*;
pub use mobly::MoblyRunner;
pub use reporter::*;
pub use roboleaf::{RoboleafModuleMap, RoboleafRunner};
pub use robolectric::RobolectricRunner;
pub use suite_plan::SuitePlanRunner;
pub use tradefed::TradefedRunner;

use crate::{
    config::TradefedConfig,
    errors::{RunnerError, UnknownTestRunnerError},
    module_info::ModuleInfo,
    options::ExtraArgs,
    test_info::{ExecMode, TestInfo},
};
use atest_metadata::AtestExitCode;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::{
    collections::BTreeSet,
    fmt,
    fs::{self, File},
    io::{self, BufRead, BufReader, Write},
    process::ExitStatus,
};
use tracing::trace;

/// The closed set of runners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RunnerKind {
    /// Tradefed via `atest_tradefed.sh`.
    Tradefed,
    /// `bazel test`.
    Bazel,
    /// Mobly test packages.
    Mobly,
    /// Legacy Robolectric tests run through make.
    Robolectric,
    /// Compatibility suite plans.
    SuitePlan,
    /// `b test` for converted modules.
    Roboleaf,
}

impl RunnerKind {
    /// Every runner.
    pub const ALL: [Self; 6] = [
        Self::Tradefed,
        Self::Bazel,
        Self::Mobly,
        Self::Robolectric,
        Self::SuitePlan,
        Self::Roboleaf,
    ];

    /// The name stored in [`TestInfo::test_runner`].
    pub const fn name(self) -> &'static str {
        match self {
            Self::Tradefed => "AtestTradefedTestRunner",
            Self::Bazel => "BazelTestRunner",
            Self::Mobly => "MoblyTestRunner",
            Self::Robolectric => "RobolectricTestRunner",
            Self::SuitePlan => "SuitePlanTestRunner",
            Self::Roboleaf => "RoboleafTestRunner",
        }
    }

    /// Looks up a runner by name.
    pub fn from_name(name: &str) -> Result<Self, UnknownTestRunnerError> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| UnknownTestRunnerError::new(name))
    }

    /// Instantiates this runner.
    pub fn create<'a>(self, ctx: &RunnerContext<'a>) -> Box<dyn TestRunner + 'a> {
        match self {
            Self::Tradefed => Box::new(TradefedRunner::new(
                ctx.results_dir.clone(),
                ctx.tradefed.clone(),
            )),
            Self::Bazel => Box::new(BazelRunner::new(ctx.module_info)),
            Self::Mobly => Box::new(MoblyRunner::new(
                ctx.host_testcases
                    .clone()
                    .unwrap_or_else(|| ctx.target_testcases.clone()),
            )),
            Self::Robolectric => Box::new(RobolectricRunner::new(
                ctx.module_info.build_top().to_owned(),
            )),
            Self::SuitePlan => Box::new(SuitePlanRunner::new()),
            Self::Roboleaf => Box::new(RoboleafRunner::new(
                ctx.roboleaf,
                ctx.module_info.build_top().to_owned(),
            )),
        }
    }
}

impl fmt::Display for RunnerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Everything runners need for one invocation.
#[derive(Clone, Debug)]
pub struct RunnerContext<'a> {
    /// The loaded module-info.
    pub module_info: &'a ModuleInfo,
    /// `$ANDROID_TARGET_OUT_TESTCASES`.
    pub target_testcases: Utf8PathBuf,
    /// The host testcases directory, if known.
    pub host_testcases: Option<Utf8PathBuf>,
    /// Where runners write logs and results.
    pub results_dir: Utf8PathBuf,
    /// Tradefed settings.
    pub tradefed: TradefedConfig,
    /// Converted modules that may run through `b test`.
    pub roboleaf: &'a RoboleafModuleMap,
}

/// An execution backend.
pub trait TestRunner: fmt::Debug {
    /// The runner name, matching [`RunnerKind::name`].
    fn name(&self) -> &'static str;

    /// Runs `tests`, returning the combined exit code of every command.
    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError>;

    /// The shell commands that would run `tests`.
    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String>;

    /// Build targets needed to run `tests`, including the runner's own.
    fn test_runner_build_reqs(&self, tests: &[TestInfo]) -> BTreeSet<String>;

    /// Returns true if the device must be synced before running `tests`.
    fn requires_device_update(&self, tests: &[TestInfo]) -> bool;

    /// Checks that the host has what this runner needs.
    fn host_env_check(&self) -> Result<(), RunnerError> {
        Ok(())
    }

    /// The file the runner's console output is written to, if any.
    fn log_file(&self) -> Option<Utf8PathBuf> {
        None
    }
}

/// Groups `test_infos` by runner.
///
/// Tests are sorted by runner name and consecutive runs are grouped, so the result is the same
/// regardless of input order.
pub fn group_tests_by_test_runners<'a>(
    test_infos: impl IntoIterator<Item = &'a TestInfo>,
) -> Result<Vec<(RunnerKind, Vec<TestInfo>)>, UnknownTestRunnerError> {
    let mut infos: Vec<&TestInfo> = test_infos.into_iter().collect();
    infos.sort_by(|a, b| a.test_runner.cmp(&b.test_runner).then_with(|| a.cmp(b)));

    let mut groups = Vec::new();
    for (runner, chunk) in &infos.into_iter().chunk_by(|info| info.test_runner.clone()) {
        let kind = RunnerKind::from_name(&runner)?;
        groups.push((kind, chunk.cloned().collect()));
    }
    Ok(groups)
}

/// Creates one invocation per runner group.
pub fn create_invocations<'a, 't>(
    ctx: &RunnerContext<'a>,
    extra_args: &ExtraArgs,
    test_infos: impl IntoIterator<Item = &'t TestInfo>,
) -> Result<Vec<TestRunnerInvocation<'a>>, UnknownTestRunnerError> {
    Ok(group_tests_by_test_runners(test_infos)?
        .into_iter()
        .map(|(kind, tests)| TestRunnerInvocation::new(kind.create(ctx), extra_args.clone(), tests))
        .collect())
}

/// Returns true if any of `tests` needs a device.
pub(crate) fn any_device_test(tests: &[TestInfo]) -> bool {
    tests
        .iter()
        .any(|test| test.supported_exec_mode() != ExecMode::Deviceless)
}

/// The union of the build targets of `tests`.
pub(crate) fn test_build_targets(tests: &[TestInfo]) -> BTreeSet<String> {
    tests
        .iter()
        .flat_map(|test| test.build_targets.iter().cloned())
        .collect()
}

/// Runs each of `commands` in turn, OR-ing their exit codes together.
pub(crate) fn run_commands(
    commands: &[String],
    dir: Option<&Utf8Path>,
    log_file: Option<&Utf8Path>,
) -> Result<i32, RunnerError> {
    let mut exit_code = AtestExitCode::SUCCESS;
    for command in commands {
        exit_code |= run_command(command, dir, log_file)?;
    }
    Ok(exit_code)
}

/// Runs `command` through `bash -c`.
///
/// With a `log_file`, output is streamed to stdout and appended to the log at the same time.
pub(crate) fn run_command(
    command: &str,
    dir: Option<&Utf8Path>,
    log_file: Option<&Utf8Path>,
) -> Result<i32, RunnerError> {
    let exec_error = |error: io::Error| RunnerError::Exec {
        command: command.to_owned(),
        error,
    };

    let mut expression = duct::cmd("bash", ["-c", command]).unchecked();
    if let Some(dir) = dir {
        expression = expression.dir(dir.as_std_path());
    }
    trace!("Executing command: {:?}", expression);

    let Some(log_file) = log_file else {
        let output = expression.run().map_err(exec_error)?;
        return Ok(exit_code(&output.status));
    };

    if let Some(parent) = log_file.parent() {
        fs::create_dir_all(parent).map_err(exec_error)?;
    }
    let mut log = File::options()
        .create(true)
        .append(true)
        .open(log_file)
        .map_err(exec_error)?;
    let handle = expression.stderr_to_stdout().reader().map_err(exec_error)?;
    let mut reader = BufReader::new(&handle);
    let mut stdout = io::stdout().lock();
    let mut line = Vec::new();
    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(exec_error)? == 0 {
            break;
        }
        stdout.write_all(&line).map_err(exec_error)?;
        log.write_all(&line).map_err(exec_error)?;
    }
    let exit_code = handle
        .try_wait()
        .map_err(exec_error)?
        .map_or(AtestExitCode::TEST_FAILURE, |output| exit_code(&output.status));
    Ok(exit_code)
}

fn exit_code(status: &ExitStatus) -> i32 {
    // Killed by a signal.
    status.code().unwrap_or(AtestExitCode::TEST_FAILURE)
}
