// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for atest: resolving test references against the Android build tree and
//! planning how to build and run them.
//!
//! The basic flow is:
//!
//! 1. [`translator::CliTranslator`] turns references such as `hello_world_test`,
//!    `FooTest#testBar` or a TEST_MAPPING group into [`test_info::TestInfo`]s, trying the
//!    [`finder`]s that match the shape of each reference in order.
//! 2. [`plan::ExecutionPlan`] validates where the tests can run, groups them by
//!    [`runner::RunnerKind`] and collects the build targets they need.
//! 3. The plan runs each [`runner::TestRunnerInvocation`] and combines the exit codes.

pub mod cache;
pub mod config;
pub mod environment;
pub mod errors;
pub mod exec_mode;
pub mod filter_types;
pub mod finder;
pub mod helpers;
pub mod levenshtein;
pub mod module_info;
pub mod options;
pub mod plan;
pub mod runner;
pub mod test_identifier;
pub mod test_info;
pub mod test_mapping;
pub mod translator;
