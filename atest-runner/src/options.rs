// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Options that drive translation and execution.

use std::{fmt, str::FromStr};

/// How tests are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RerunOption {
    /// Run every test this many times.
    Iterations(u32),
    /// Rerun until a test fails, at most this many times.
    RerunUntilFailure(u32),
    /// Retry failed tests, at most this many times.
    RetryAnyFailure(u32),
}

impl RerunOption {
    /// The Tradefed retry strategy name.
    pub fn strategy(self) -> &'static str {
        match self {
            Self::Iterations(_) => "ITERATIONS",
            Self::RerunUntilFailure(_) => "RERUN_UNTIL_FAILURE",
            Self::RetryAnyFailure(_) => "RETRY_ANY_FAILURE",
        }
    }

    /// The maximum number of runs per test case.
    pub fn count(self) -> u32 {
        match self {
            Self::Iterations(count)
            | Self::RerunUntilFailure(count)
            | Self::RetryAnyFailure(count) => count,
        }
    }
}

/// Arguments passed through to runners.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtraArgs {
    /// Device serials to run against.
    pub serial: Vec<String>,
    /// Number of shards.
    pub sharding: Option<u32>,
    /// Run on every ABI the device supports.
    pub all_abi: bool,
    /// Run without a device.
    pub host: bool,
    /// Wait for a debugger before running.
    pub wait_for_debugger: bool,
    /// Skip installation steps.
    pub disable_install: bool,
    /// Skip teardown steps.
    pub disable_teardown: bool,
    /// How tests are retried.
    pub rerun: Option<RerunOption>,
    /// Only collect tests, don't run them.
    pub collect_tests_only: bool,
    /// Passed to the runner verbatim.
    pub custom_args: Vec<String>,
    /// Use the minimal Tradefed template.
    pub use_tf_min_base_template: bool,
    /// Merge tests and filters of the same module into a single entry.
    pub group_test: bool,
    /// Print commands instead of running them.
    pub dry_run: bool,
}

impl Default for ExtraArgs {
    fn default() -> Self {
        Self {
            serial: Vec::new(),
            sharding: None,
            all_abi: false,
            host: false,
            wait_for_debugger: false,
            disable_install: false,
            disable_teardown: false,
            rerun: None,
            collect_tests_only: false,
            custom_args: Vec::new(),
            use_tf_min_base_template: false,
            group_test: true,
            dry_run: false,
        }
    }
}

/// Which converted modules run through `b test`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RoboleafMode {
    /// Never.
    #[default]
    Off,
    /// Converted modules on the launch allowlist.
    On,
    /// Every converted module.
    Dev,
}

impl FromStr for RoboleafMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Self::Off),
            "on" => Ok(Self::On),
            "dev" => Ok(Self::Dev),
            other => Err(format!("unknown roboleaf mode `{other}` (expected off, on or dev)")),
        }
    }
}

impl fmt::Display for RoboleafMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Dev => "dev",
        })
    }
}

/// Everything the user asked for in one invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Test references as typed.
    pub tests: Vec<String>,
    /// Run tests from TEST_MAPPING files.
    pub test_mapping: bool,
    /// Also read TEST_MAPPING files in subdirectories.
    pub include_subdirs: bool,
    /// Drop cached results for the references before resolving them.
    pub clear_cache: bool,
    /// Suggest similar modules for unresolved references.
    pub fuzzy_search: bool,
    /// Run unit tests through Bazel.
    pub bazel_mode: bool,
    /// Which converted modules run through `b test`.
    pub roboleaf_mode: RoboleafMode,
    /// Skip tests that don't need a device.
    pub device_only: bool,
    /// A virtual device will be started, so no attached device is needed.
    pub start_avd: bool,
    /// A cloud device will be created, so no attached device is needed.
    pub acloud_create: bool,
    /// Arguments passed through to runners.
    pub extra: ExtraArgs,
}

impl RunOptions {
    /// Returns true if tests come from TEST_MAPPING files: either requested explicitly, or implied
    /// by the absence of references or by a `path:group` reference.
    pub fn is_test_mapping(&self) -> bool {
        if self.test_mapping {
            return true;
        }
        match self.tests.as_slice() {
            [] => true,
            [first, ..] => first.starts_with(':'),
        }
    }
}
