// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `atest` failures.
///
/// `atest` runs may fail for a variety of reasons. This structure documents the exit codes that
/// may occur in case of expected failures. Each code is distinct so that wrappers can tell a user
/// error apart from a test failure.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum AtestExitCode {}

impl AtestExitCode {
    /// No errors occurred and atest exited normally.
    pub const SUCCESS: i32 = 0;

    /// The Android build environment (`lunch`) was not set up.
    pub const ENV_NOT_SETUP: i32 = 1;

    /// Building the required targets failed.
    pub const BUILD_FAILURE: i32 = 2;

    /// A generic error occurred.
    pub const ERROR: i32 = 3;

    /// None of the given test references could be resolved.
    pub const TEST_NOT_FOUND: i32 = 4;

    /// One or more tests failed, or a runner crashed.
    pub const TEST_FAILURE: i32 = 5;

    /// Verifying test commands failed.
    pub const VERIFY_FAILURE: i32 = 6;

    /// atest was invoked outside the Android source tree.
    pub const OUTSIDE_ROOT: i32 = 7;

    /// Creating a virtual device failed.
    pub const AVD_CREATE_FAILURE: i32 = 8;

    /// The arguments for creating a virtual device were invalid.
    pub const AVD_INVALID_ARGS: i32 = 9;

    /// atest exited before reaching its main flow.
    pub const EXIT_BEFORE_MAIN: i32 = 10;

    /// Device tests were requested but no device is attached.
    pub const DEVICE_NOT_FOUND: i32 = 11;

    /// Wildcard and regular test filters were mixed for the same module.
    pub const MIXED_TYPE_FILTER: i32 = 12;

    /// A test reference was malformed.
    pub const INPUT_TEST_REFERENCE_ERROR: i32 = 13;

    /// A configuration file could not be parsed.
    pub const CONFIG_INVALID_FORMAT: i32 = 14;

    /// The resolved tests cannot run in a single execution mode.
    pub const INVALID_EXEC_MODE: i32 = 16;

    /// The TEST_MAPPING arguments were invalid.
    pub const INVALID_TM_ARGS: i32 = 19;

    /// A TEST_MAPPING file was not valid JSON.
    pub const INVALID_TM_FORMAT: i32 = 20;

    /// Returns true if `code` is produced before any test starts running.
    ///
    /// These failures happen while the environment or the test references are being checked, so
    /// no results were collected.
    pub fn exits_before_test(code: i32) -> bool {
        matches!(
            code,
            Self::ENV_NOT_SETUP
                | Self::TEST_NOT_FOUND
                | Self::OUTSIDE_ROOT
                | Self::AVD_CREATE_FAILURE
                | Self::AVD_INVALID_ARGS
        )
    }
}
