// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use atest::AtestApp;
use clap::Parser;
use color_eyre::Result;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = AtestApp::parse();
    let output = app.init_output();

    match app.exec() {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code())
        }
    }
}
