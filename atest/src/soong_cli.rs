// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wrappers around the build and device-update commands.

use crate::{errors::ExpectedError, output::NO_HEADING};
use camino::Utf8Path;
use itertools::Itertools;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The build entry point, relative to the build top.
const SOONG_UI: &str = "build/soong/soong_ui.bash";

/// Represents a `soong_ui.bash --make-mode` invocation.
#[derive(Clone, Debug)]
pub(crate) struct SoongCli<'a> {
    build_top: &'a Utf8Path,
    args: Vec<String>,
}

impl<'a> SoongCli<'a> {
    pub(crate) fn new(build_top: &'a Utf8Path, targets: &BTreeSet<String>) -> Self {
        let mut args = vec!["--make-mode".to_owned()];
        args.extend(targets.iter().cloned());
        Self { build_top, args }
    }

    pub(crate) fn all_args(&self) -> String {
        std::iter::once(SOONG_UI)
            .chain(self.args.iter().map(String::as_str))
            .join(" ")
    }

    fn to_expression(&self) -> duct::Expression {
        duct::cmd(self.build_top.join(SOONG_UI).as_str(), &self.args)
            .dir(self.build_top.as_std_path())
            .unchecked()
    }

    /// Builds the targets, streaming the build output.
    pub(crate) fn build(&self) -> Result<(), ExpectedError> {
        info!(target: NO_HEADING, "\nBuilding Dependencies...");
        let expression = self.to_expression();
        debug!("Executing command: {:?}", expression);
        let output = expression
            .run()
            .map_err(|err| ExpectedError::build_exec_failed(self.all_args(), err))?;
        if !output.status.success() {
            return Err(ExpectedError::BuildFailed {
                command: self.all_args(),
                exit_code: output.status.code(),
            });
        }
        Ok(())
    }
}

/// Syncs the freshly built artifacts to the attached device.
pub(crate) fn update_device(build_top: &Utf8Path) -> Result<(), ExpectedError> {
    const COMMAND: &str = "adevice update";
    info!(target: NO_HEADING, "\nUpdating device...");
    let output = duct::cmd("adevice", ["update"])
        .dir(build_top.as_std_path())
        .unchecked()
        .run()
        .map_err(|err| ExpectedError::build_exec_failed(COMMAND, err))?;
    if !output.status.success() {
        return Err(ExpectedError::DeviceUpdateFailed {
            command: COMMAND.to_owned(),
            exit_code: output.status.code(),
        });
    }
    Ok(())
}
