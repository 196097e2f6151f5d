// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by atest.

use camino::Utf8PathBuf;
use config::ConfigError;
use itertools::Itertools;
use std::{fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse atest config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of a [`ConfigParseError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The user config directory could not be determined.
    #[error("user config path is not valid UTF-8: {}", path.display())]
    NonUtf8Path {
        /// The path that failed to convert.
        path: std::path::PathBuf,
    },
}

/// An error that occurs while reading the Android build environment.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnvironmentError {
    /// A required environment variable is not set.
    #[error(
        "environment variable `{var}` is not set (run `source build/envsetup.sh` and `lunch` first)"
    )]
    NotSetUp {
        /// The missing variable.
        var: &'static str,
    },

    /// The current directory is outside the Android source tree.
    #[error("atest must be run from within the Android source tree `{build_top}` (current directory: `{cwd}`)")]
    OutsideRoot {
        /// The current directory.
        cwd: Utf8PathBuf,
        /// The build top.
        build_top: Utf8PathBuf,
    },

    /// The current directory could not be determined.
    #[error("failed to determine the current directory")]
    CurrentDir(#[source] io::Error),

    /// The current directory is not valid UTF-8.
    #[error("current directory is not valid UTF-8: {}", path.display())]
    CurrentDirNotUtf8 {
        /// The directory.
        path: std::path::PathBuf,
    },
}

/// A mainline-decorated test reference failed verification.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MainlineVerifyError {
    /// The base test is not a module.
    #[error("Error: \"{test}\" is not a testable module.")]
    NotAModule {
        /// The base test name.
        test: String,
    },

    /// One or more mainline modules are unknown.
    #[error("Error: Cannot find {} in module info!", .modules.iter().join(", "))]
    UnknownModules {
        /// Every unknown mainline module.
        modules: Vec<String>,
    },

    /// The mainline combination is not declared for the test.
    #[error(
        "Error: Mainline modules \"{binaries}\" were not defined for {test} in neither build file \
         nor test config."
    )]
    NotDeclared {
        /// The binaries as written.
        binaries: String,
        /// The base test name.
        test: String,
    },
}

/// An error that occurred while loading `module-info.json`.
#[derive(Debug, Error)]
#[error("failed to load module info from `{path}`")]
pub struct ModuleInfoLoadError {
    path: Utf8PathBuf,
    #[source]
    kind: ModuleInfoLoadErrorKind,
}

impl ModuleInfoLoadError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, kind: ModuleInfoLoadErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    /// The path that failed to load.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// What went wrong.
    pub fn kind(&self) -> &ModuleInfoLoadErrorKind {
        &self.kind
    }
}

/// The kind of a [`ModuleInfoLoadError`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleInfoLoadErrorKind {
    /// The file could not be read.
    #[error("error reading file")]
    Read(#[source] io::Error),

    /// The file could not be parsed.
    #[error("error parsing JSON")]
    Parse(#[source] serde_json::Error),
}

/// A TEST_MAPPING file is not valid JSON.
#[derive(Debug, Error)]
#[error("invalid TEST_MAPPING format at `{path}`")]
pub struct TestMappingParseError {
    path: Utf8PathBuf,
    #[source]
    error: serde_json::Error,
}

impl TestMappingParseError {
    pub(crate) fn new(path: impl Into<Utf8PathBuf>, error: serde_json::Error) -> Self {
        Self {
            path: path.into(),
            error,
        }
    }

    /// The path to the offending file.
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }
}

/// An error that occurred while expanding TEST_MAPPING files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestMappingError {
    /// A TEST_MAPPING file could not be parsed.
    #[error(transparent)]
    Parse(#[from] TestMappingParseError),

    /// A TEST_MAPPING file could not be read.
    #[error("failed to read TEST_MAPPING file `{path}`")]
    Read {
        /// The file.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The arguments used to select TEST_MAPPING tests were invalid.
    #[error("invalid TEST_MAPPING arguments: {message}")]
    InvalidArgs {
        /// A description of what was wrong.
        message: String,
    },
}

/// The resolved tests cannot run in a single execution mode.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExecModeError {
    /// Device-only tests were requested in a host-only run.
    #[error(
        "specified --host, but the following tests are device-only: {}",
        .tests.iter().join(", ")
    )]
    DeviceOnlyTestsOnHost {
        /// The device-only tests.
        tests: Vec<String>,
    },

    /// Host-only and device-only tests appeared in the same run.
    #[error("There are host-only and device-only tests in command.")]
    MixedDeviceRequirements,

    /// Host-only tests appeared in a device-only run.
    #[error("There are host-only tests in command.")]
    HostOnlyTestsOnDevice {
        /// The host-only tests.
        tests: Vec<String>,
    },

    /// Device tests were requested but no device is attached.
    #[error(
        "Stop running test(s): {} require a device.",
        .tests.iter().join(", ")
    )]
    DeviceNotFound {
        /// The tests that required a device.
        tests: Vec<String>,
    },
}

/// Wildcard and regular filters were combined for the same module.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error(
    "Mixed type filters found. Please separate tests into different runs. (modules: {})",
    .modules.iter().join(", ")
)]
pub struct MixedFilterError {
    modules: Vec<String>,
}

impl MixedFilterError {
    pub(crate) fn new(modules: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            modules: modules.into_iter().map(Into::into).collect(),
        }
    }

    /// The modules with mixed filter types.
    pub fn modules(&self) -> &[String] {
        &self.modules
    }
}

/// A test runner name that atest does not know about.
///
/// This indicates a finder bug rather than a user error.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unknown test runner `{name}`")]
pub struct UnknownTestRunnerError {
    name: String,
}

impl UnknownTestRunnerError {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The runner name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An error that occurred while a runner was executing tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunnerError {
    /// A runner command could not be started.
    #[error("failed to execute `{command}`")]
    Exec {
        /// The command.
        command: String,
        /// The underlying error.
        #[source]
        error: io::Error,
    },

    /// The host environment is missing something the runner needs.
    #[error("host environment check failed for {runner}: {message}")]
    HostEnv {
        /// The runner name.
        runner: &'static str,
        /// What is missing.
        message: String,
    },

    /// The runner could not assemble its command.
    #[error("{runner} cannot run {test}: {message}")]
    InvalidTest {
        /// The runner name.
        runner: &'static str,
        /// The test.
        test: String,
        /// What went wrong.
        message: String,
    },
}

/// An error that occurred while listing attached devices.
#[derive(Debug, Error)]
#[error("failed to list attached devices with `{command}`")]
pub struct DeviceListError {
    command: String,
    #[source]
    error: io::Error,
}

impl DeviceListError {
    pub(crate) fn new(command: impl Into<String>, error: io::Error) -> Self {
        Self {
            command: command.into(),
            error,
        }
    }
}

/// An error that occurred while translating test references into tests.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TranslateError {
    /// None of the references could be resolved.
    #[error("no tests found for: {}", .references.iter().join(", "))]
    TestsNotFound {
        /// The references that failed to resolve.
        references: Vec<String>,
    },

    /// No tests were found in the selected TEST_MAPPING groups.
    #[error("no tests found in TEST_MAPPING groups {}", DisplayGroups(.groups))]
    NoTestMappingTests {
        /// The groups that were requested.
        groups: Vec<String>,
        /// The groups that do exist.
        available: Vec<String>,
    },

    /// Filters of different types were used for the same module.
    #[error(transparent)]
    MixedFilter(#[from] MixedFilterError),

    /// TEST_MAPPING expansion failed.
    #[error(transparent)]
    TestMapping(#[from] TestMappingError),
}

/// Displays an error followed by its chain of sources, on one line.
#[derive(Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new chain display for `error`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(err) = source {
            write!(f, ": {err}")?;
            source = err.source();
        }
        Ok(())
    }
}

struct DisplayGroups<'a>(&'a [String]);

impl fmt::Display for DisplayGroups<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.0.iter().join(", "))
    }
}

/// An error that occurred while creating or running an execution plan.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PlanError {
    /// Execution mode validation failed.
    #[error(transparent)]
    ExecMode(#[from] ExecModeError),

    /// A test was assigned to an unknown runner.
    #[error(transparent)]
    UnknownTestRunner(#[from] UnknownTestRunnerError),

    /// Attached devices could not be listed.
    #[error(transparent)]
    DeviceList(#[from] DeviceListError),
}
