// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable surface of `atest`.
//!
//! Currently this is just the set of documented process exit codes, see [`AtestExitCode`].

mod exit_codes;

pub use exit_codes::*;
