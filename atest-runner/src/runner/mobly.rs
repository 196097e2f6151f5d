// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    ResultReporter, RunnerKind, TestRunner, any_device_test, run_commands, test_build_targets,
};
use crate::{errors::RunnerError, options::ExtraArgs, test_info::TestInfo};
use camino::Utf8PathBuf;
use std::collections::BTreeSet;
use swrite::{SWrite, swrite};

/// Runs Mobly test packages.
#[derive(Debug)]
pub struct MoblyRunner {
    testcases: Utf8PathBuf,
}

impl MoblyRunner {
    /// Creates a runner for packages installed under `testcases`.
    pub fn new(testcases: Utf8PathBuf) -> Self {
        Self { testcases }
    }
}

impl TestRunner for MoblyRunner {
    fn name(&self) -> &'static str {
        RunnerKind::Mobly.name()
    }

    fn host_env_check(&self) -> Result<(), RunnerError> {
        if self.testcases.is_dir() {
            Ok(())
        } else {
            Err(RunnerError::HostEnv {
                runner: RunnerKind::Mobly.name(),
                message: format!("testcases directory `{}` does not exist", self.testcases),
            })
        }
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        _reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        run_commands(&self.generate_run_commands(tests, extra_args), None, None)
    }

    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        tests
            .iter()
            .map(|test| {
                let name = &test.raw_test_name;
                let package = self.testcases.join(name).join(format!("{name}.zip"));
                let mut command = format!("python3 {}", shell_words::quote(package.as_str()));
                let selected: Vec<String> = test
                    .data
                    .filters
                    .iter()
                    .flat_map(|filter| {
                        if filter.methods.is_empty() {
                            vec![filter.class_name.clone()]
                        } else {
                            filter
                                .methods
                                .iter()
                                .map(|method| format!("{}.{method}", filter.class_name))
                                .collect()
                        }
                    })
                    .collect();
                if !selected.is_empty() {
                    swrite!(command, " --tests {}", shell_words::join(&selected));
                }
                for serial in &extra_args.serial {
                    swrite!(command, " --serial {}", shell_words::quote(serial));
                }
                command
            })
            .collect()
    }

    fn test_runner_build_reqs(&self, tests: &[TestInfo]) -> BTreeSet<String> {
        test_build_targets(tests)
    }

    fn requires_device_update(&self, tests: &[TestInfo]) -> bool {
        any_device_test(tests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_info::TestFilter;
    use pretty_assertions::assert_eq;

    #[test]
    fn commands() {
        let runner = MoblyRunner::new(Utf8PathBuf::from("/out/host/testcases"));
        let whole = TestInfo::new("wifi_test", "MoblyTestRunner", ["wifi_test"]);
        let filtered = TestInfo::new("bt_test", "MoblyTestRunner", ["bt_test"])
            .with_filters([TestFilter::new("BtTest", ["test_pair", "test_scan"])]);
        assert_eq!(
            runner.generate_run_commands(&[whole.clone(), filtered.clone()], &ExtraArgs::default()),
            [
                "python3 /out/host/testcases/wifi_test/wifi_test.zip",
                "python3 /out/host/testcases/bt_test/bt_test.zip \
                 --tests BtTest.test_pair BtTest.test_scan",
            ]
        );
        assert_eq!(
            runner.test_runner_build_reqs(&[whole, filtered]),
            BTreeSet::from(["bt_test".to_owned(), "wifi_test".to_owned()])
        );
    }
}
