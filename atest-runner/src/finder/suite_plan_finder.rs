// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compatibility suite plans such as `cts`.

use super::module_finder::FindResult;
use crate::{runner::RunnerKind, test_info::TestInfo};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

const SUITE_HARNESS_DIR: &str = "test/suite_harness/tools";

static SUITE_PLAN_PATH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^test/suite_harness/tools/(?P<suite>[^/]+)-tradefed/res/config/(?P<plan>[^/]+)\.xml$")
        .expect("suite plan path regex is valid")
});

/// Resolves suite plan names against the suite harness configs.
#[derive(Debug)]
pub struct SuitePlanFinder<'a> {
    build_top: &'a Utf8Path,
    cwd: Utf8PathBuf,
}

impl<'a> SuitePlanFinder<'a> {
    pub(crate) fn new(build_top: &'a Utf8Path, cwd: Utf8PathBuf) -> Self {
        Self { build_top, cwd }
    }

    fn rel_plan_path(suite: &str) -> String {
        format!("{SUITE_HARNESS_DIR}/{suite}-tradefed/res/config/{suite}.xml")
    }

    /// Finds the plan for `suite`, e.g. `cts`.
    pub fn find_test_by_suite_name(&self, suite: &str) -> FindResult {
        if suite.contains('/') {
            return Ok(Vec::new());
        }
        let rel_config = Self::rel_plan_path(suite);
        if !self.build_top.join(&rel_config).is_file() {
            return Ok(Vec::new());
        }
        Ok(vec![suite_plan_info(suite, rel_config)])
    }

    /// Finds the suite plan at `path`.
    pub fn find_test_by_suite_path(&self, path: &str) -> FindResult {
        let Ok(path) = self.cwd.join(path).canonicalize_utf8() else {
            return Ok(Vec::new());
        };
        let Ok(rel_path) = path.strip_prefix(self.build_top) else {
            return Ok(Vec::new());
        };
        let Some(captures) = SUITE_PLAN_PATH_RE.captures(rel_path.as_str()) else {
            debug!("{rel_path} is not a suite plan");
            return Ok(Vec::new());
        };
        let suite = &captures["suite"];
        if &captures["plan"] != suite {
            return Ok(Vec::new());
        }
        Ok(vec![suite_plan_info(suite, rel_path.to_string())])
    }
}

fn suite_plan_info(suite: &str, rel_config: String) -> TestInfo {
    let mut info = TestInfo::new(suite, RunnerKind::SuitePlan.name(), [suite]).with_rel_config(rel_config);
    info.suite = Some(suite.to_owned());
    info
}
