// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING, StderrStyles};
use atest_metadata::AtestExitCode;
use atest_runner::errors::{
    ConfigParseError, EnvironmentError, ExecModeError, ModuleInfoLoadError,
    ModuleInfoLoadErrorKind, PlanError, TestMappingError, TranslateError,
};
use itertools::Itertools;
use owo_colors::OwoColorize;
use std::error::Error;
use thiserror::Error;
use tracing::{error, info};

// The top-level error for the atest binary. Each variant maps to an exit code, and
// display_to_stderr prints it with its chain of causes.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("environment error")]
    Environment {
        #[from]
        err: EnvironmentError,
    },
    #[error("config parse error")]
    ConfigParse {
        #[from]
        err: ConfigParseError,
    },
    #[error("module info load error")]
    ModuleInfoLoad {
        #[from]
        err: ModuleInfoLoadError,
    },
    #[error("translate error")]
    Translate {
        #[from]
        err: TranslateError,
    },
    #[error("plan error")]
    Plan {
        #[from]
        err: PlanError,
    },
    #[error("build exec failed")]
    BuildExecFailed {
        command: String,
        #[source]
        err: std::io::Error,
    },
    #[error("build failed")]
    BuildFailed {
        command: String,
        exit_code: Option<i32>,
    },
    #[error("device update failed")]
    DeviceUpdateFailed {
        command: String,
        exit_code: Option<i32>,
    },
    #[error("test run failed")]
    TestRunFailed { exit_code: i32 },
}

impl ExpectedError {
    pub(crate) fn build_exec_failed(command: impl Into<String>, err: std::io::Error) -> Self {
        Self::BuildExecFailed {
            command: command.into(),
            err,
        }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::Environment { err } => match err {
                EnvironmentError::OutsideRoot { .. } => AtestExitCode::OUTSIDE_ROOT,
                EnvironmentError::NotSetUp { .. } => AtestExitCode::ENV_NOT_SETUP,
                _ => AtestExitCode::ERROR,
            },
            Self::ConfigParse { .. } => AtestExitCode::CONFIG_INVALID_FORMAT,
            Self::ModuleInfoLoad { err } => match err.kind() {
                // module-info.json is produced by the build, so a missing file means the tree
                // hasn't been built for this target yet.
                ModuleInfoLoadErrorKind::Read(_) => AtestExitCode::ENV_NOT_SETUP,
                _ => AtestExitCode::ERROR,
            },
            Self::Translate { err } => match err {
                TranslateError::TestsNotFound { .. }
                | TranslateError::NoTestMappingTests { .. } => AtestExitCode::TEST_NOT_FOUND,
                TranslateError::MixedFilter(_) => AtestExitCode::MIXED_TYPE_FILTER,
                TranslateError::TestMapping(TestMappingError::InvalidArgs { .. }) => {
                    AtestExitCode::INVALID_TM_ARGS
                }
                TranslateError::TestMapping(_) => AtestExitCode::INVALID_TM_FORMAT,
                _ => AtestExitCode::ERROR,
            },
            Self::Plan { err } => match err {
                PlanError::ExecMode(ExecModeError::DeviceNotFound { .. }) => {
                    AtestExitCode::DEVICE_NOT_FOUND
                }
                PlanError::ExecMode(_) => AtestExitCode::INVALID_EXEC_MODE,
                PlanError::DeviceList(_) => AtestExitCode::DEVICE_NOT_FOUND,
                _ => AtestExitCode::ERROR,
            },
            Self::BuildExecFailed { .. } | Self::BuildFailed { .. } => {
                AtestExitCode::BUILD_FAILURE
            }
            Self::DeviceUpdateFailed { .. } => AtestExitCode::ERROR,
            Self::TestRunFailed { .. } => AtestExitCode::TEST_FAILURE,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match &self {
            Self::Environment { err } => {
                error!("{err}");
                err.source()
            }
            Self::ConfigParse { err } => {
                error!(
                    "failed to parse atest config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ModuleInfoLoad { err } => {
                error!(
                    "failed to load module info from `{}`",
                    err.path().style(styles.bold)
                );
                if matches!(err.kind(), ModuleInfoLoadErrorKind::Read(_)) {
                    info!("build the tree first, for example with `m nothing`");
                }
                Some(err.kind() as &dyn Error)
            }
            Self::Translate { err } => {
                match err {
                    TranslateError::TestsNotFound { references } => {
                        error!(
                            "no tests found for: {}",
                            references.iter().map(|r| r.style(styles.bold)).join(", ")
                        );
                    }
                    TranslateError::NoTestMappingTests { groups, available } => {
                        error!(
                            "no tests found in TEST_MAPPING groups: {}",
                            groups.iter().map(|g| g.style(styles.bold)).join(", ")
                        );
                        if !available.is_empty() {
                            info!(
                                "available groups: {}",
                                available
                                    .iter()
                                    .map(|g| g.style(styles.warning_text))
                                    .join(", ")
                            );
                        }
                    }
                    other => error!("{other}"),
                }
                err.source()
            }
            Self::Plan { err } => {
                error!("{err}");
                err.source()
            }
            Self::BuildExecFailed { command, err } => {
                error!("failed to execute `{}`", command.style(styles.bold));
                Some(err as &dyn Error)
            }
            Self::BuildFailed { command, exit_code } => {
                error!(
                    "build failed{}: `{}`",
                    DisplayExitCode(*exit_code),
                    command.style(styles.bold)
                );
                None
            }
            Self::DeviceUpdateFailed { command, exit_code } => {
                error!(
                    "device update failed{}: `{}`",
                    DisplayExitCode(*exit_code),
                    command.style(styles.bold)
                );
                None
            }
            Self::TestRunFailed { exit_code } => {
                error!("test run failed (exit code {exit_code})");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

struct DisplayExitCode(Option<i32>);

impl std::fmt::Display for DisplayExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(code) => write!(f, " with exit code {code}"),
            None => write!(f, " (terminated by signal)"),
        }
    }
}
