// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `atest` command-line tool: finds, builds and runs Android tests.
//!
//! The heavy lifting lives in [`atest_runner`]. This crate parses arguments, sets up output, and
//! maps errors to the exit codes documented in [`atest_metadata`].

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;
mod soong_cli;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputContext;
