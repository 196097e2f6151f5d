// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing and verification of mainline-decorated test references.
//!
//! A test reference may carry a trailing list of mainline binaries, for example
//! `CtsNetTestCases[com.google.android.tethering.apex+com.google.android.wifi.apk]`. The parser
//! keeps the binaries exactly as written: sorting, deduplication and whitespace rules are enforced
//! by the build, and reordering them here would hide those errors.

use crate::{errors::MainlineVerifyError, module_info::ModuleInfo};
use regex::Regex;
use std::sync::LazyLock;
use tracing::error;

static MAINLINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<test>.*)\[(?P<mainline_modules>.*[.](apk|apks|apex))\]$")
        .expect("mainline regex is valid")
});

static PACKAGE_EXT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(apex|apks|apk)$").expect("extension regex is valid"));

/// A test reference split into its base name and mainline decoration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TestIdentifier {
    /// The base test name with any `[...]` suffix stripped.
    pub test_name: String,

    /// Mainline module names, with the packaging extension stripped.
    pub module_names: Vec<String>,

    /// The mainline binaries as written, in the same order as `module_names`.
    pub binary_names: Vec<String>,
}

impl TestIdentifier {
    /// Parses a raw test reference.
    ///
    /// A reference that doesn't carry a mainline decoration is treated as a plain test name.
    pub fn parse(test: &str) -> Self {
        let Some(captures) = MAINLINE_RE.captures(test) else {
            return Self {
                test_name: test.to_owned(),
                module_names: Vec::new(),
                binary_names: Vec::new(),
            };
        };

        let test_name = captures["test"].to_owned();
        let binary_names: Vec<String> = captures["mainline_modules"]
            .split('+')
            .map(ToOwned::to_owned)
            .collect();
        let module_names = binary_names
            .iter()
            .map(|binary| PACKAGE_EXT_RE.replace(binary, "").into_owned())
            .collect();

        Self {
            test_name,
            module_names,
            binary_names,
        }
    }

    /// Returns true if the reference carried a mainline decoration.
    pub fn is_mainline(&self) -> bool {
        !self.binary_names.is_empty()
    }

    /// The mainline binaries joined the way they were written.
    pub fn joined_binaries(&self) -> String {
        self.binary_names.join("+")
    }

    /// Checks that the mainline decoration refers to real modules, and that the combination is
    /// declared for the test.
    ///
    /// On failure the reason is logged and `false` is returned.
    pub fn verify(&self, module_info: &ModuleInfo) -> bool {
        match self.check(module_info) {
            Ok(()) => true,
            Err(error) => {
                error!("{error}");
                false
            }
        }
    }

    /// Like [`Self::verify`], but returns the reason for a failure instead of logging it.
    ///
    /// Every unknown mainline module is reported together.
    pub fn check(&self, module_info: &ModuleInfo) -> Result<(), MainlineVerifyError> {
        if self.binary_names.is_empty() {
            return Ok(());
        }

        if !module_info.is_module(&self.test_name) {
            return Err(MainlineVerifyError::NotAModule {
                test: self.test_name.clone(),
            });
        }

        let unknown: Vec<String> = self
            .module_names
            .iter()
            .filter(|name| !module_info.is_module(name))
            .cloned()
            .collect();
        if !unknown.is_empty() {
            return Err(MainlineVerifyError::UnknownModules { modules: unknown });
        }

        if !module_info.has_mainline_modules(&self.test_name, &self.binary_names) {
            return Err(MainlineVerifyError::NotDeclared {
                binaries: self.joined_binaries(),
                test: self.test_name.clone(),
            });
        }

        Ok(())
    }
}
