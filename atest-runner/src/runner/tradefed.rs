// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Tradefed runner, which drives `atest_tradefed.sh`.

use super::{ResultReporter, RunnerKind, TestRunner, any_device_test, run_commands, test_build_targets};
use crate::{
    config::TradefedConfig,
    errors::RunnerError,
    finder::FinderMethod,
    options::ExtraArgs,
    test_identifier::TestIdentifier,
    test_info::{TestData, TestInfo},
};
use camino::Utf8PathBuf;
use std::collections::{BTreeMap, BTreeSet};
use swrite::{SWrite, swrite};

const EXECUTABLE: &str = "atest_tradefed.sh";
const TEMPLATE_MIN: &str = "template/atest_local_min";
const TEMPLATE_DEVICE: &str = "template/atest_device_test_base";
const TEMPLATE_DEVICELESS: &str = "template/atest_deviceless_test_base";
const LOG_SAVER: &str = "template/log/atest_log_saver";
const OUTPUT_LOG: &str = "tradefed-output.log";

/// Build targets every Tradefed run needs.
pub const TRADEFED_BUILD_REQS: [&str; 3] = ["tradefed-core", "atest-tradefed", EXECUTABLE];

const INCLUDE_FILTER: &str = "include-filter";
const EXCLUDE_FILTER: &str = "exclude-filter";

/// Runs tests through Tradefed.
#[derive(Debug)]
pub struct TradefedRunner {
    results_dir: Utf8PathBuf,
    config: TradefedConfig,
}

impl TradefedRunner {
    /// Creates a runner writing its logs under `results_dir`.
    pub fn new(results_dir: Utf8PathBuf, config: TradefedConfig) -> Self {
        Self {
            results_dir,
            config,
        }
    }

    /// The Tradefed arguments selecting `tests`, followed by those derived from `extra_args`.
    pub fn create_test_args(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        let mut args = Vec::new();
        for test in tests {
            args.extend(["--include-filter".to_owned(), test.test_name.clone()]);
            args.extend(module_args(&test.test_name, &test.data));
            for filter in &test.data.filters {
                for tf_filter in filter.to_tf_strings() {
                    args.extend([
                        "--atest-include-filter".to_owned(),
                        format!("{}:{tf_filter}", test.test_name),
                    ]);
                }
            }
        }

        let loads_config_jar = tests.iter().any(|test| {
            test.test_finder == FinderMethod::Integration.name()
                || test.test_finder == FinderMethod::IntegrationFilePath.name()
        });
        if !loads_config_jar {
            args.push("--skip-loading-config-jar".to_owned());
        }
        if tests
            .iter()
            .any(|test| TestIdentifier::parse(&test.test_name).is_mainline())
        {
            args.push("--enable-mainline-parameterized-modules".to_owned());
        }

        args.extend([
            "--log-level-display".to_owned(),
            self.config.log_level.clone(),
            "--log-level".to_owned(),
            self.config.log_level.clone(),
        ]);
        if !self.config.early_device_release {
            args.push("--no-early-device-release".to_owned());
        }

        args.extend(extra_tf_args(extra_args));
        args
    }

    fn log_args(&self) -> Vec<String> {
        vec![
            format!("--atest-log-file-path={}", self.results_dir.join("log")),
            "--no-enable-granular-attempts".to_owned(),
        ]
    }
}

impl TestRunner for TradefedRunner {
    fn name(&self) -> &'static str {
        RunnerKind::Tradefed.name()
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        _reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        let log_file = self.results_dir.join(OUTPUT_LOG);
        run_commands(
            &self.generate_run_commands(tests, extra_args),
            None,
            Some(&log_file),
        )
    }

    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        let tests = if extra_args.group_test {
            flatten_test_infos(tests)
        } else {
            tests.to_vec()
        };
        let template = if extra_args.use_tf_min_base_template {
            TEMPLATE_MIN
        } else if extra_args.host {
            TEMPLATE_DEVICELESS
        } else {
            TEMPLATE_DEVICE
        };

        let mut command = format!(
            "{EXECUTABLE} {template} --template:map test=atest --template:map log_saver={LOG_SAVER}"
        );
        for arg in self
            .log_args()
            .into_iter()
            .chain(self.create_test_args(&tests, extra_args))
        {
            swrite!(command, " {}", shell_words::quote(&arg));
        }
        vec![command]
    }

    fn test_runner_build_reqs(&self, tests: &[TestInfo]) -> BTreeSet<String> {
        let mut reqs = test_build_targets(tests);
        reqs.extend(TRADEFED_BUILD_REQS.iter().map(|req| (*req).to_owned()));
        reqs
    }

    fn requires_device_update(&self, tests: &[TestInfo]) -> bool {
        any_device_test(tests)
    }

    fn log_file(&self) -> Option<Utf8PathBuf> {
        Some(self.results_dir.join(OUTPUT_LOG))
    }
}

/// Module args from TEST_MAPPING `options`, as Tradefed arguments.
fn module_args(test_name: &str, data: &TestData) -> Vec<String> {
    data.module_args
        .iter()
        .flat_map(|(option, value)| match option.as_str() {
            INCLUDE_FILTER | EXCLUDE_FILTER => {
                [format!("--{option}"), format!("{test_name} {value}")]
            }
            _ => [
                "--module-arg".to_owned(),
                format!("{test_name}:{option}:{value}"),
            ],
        })
        .collect()
}

/// Tradefed arguments for `extra_args`.
pub fn extra_tf_args(extra_args: &ExtraArgs) -> Vec<String> {
    let mut args = Vec::new();
    if extra_args.wait_for_debugger {
        args.push("--wait-for-debugger".to_owned());
    }
    if extra_args.disable_install {
        args.push("--disable-target-preparers".to_owned());
    }
    for serial in &extra_args.serial {
        args.extend(["--serial".to_owned(), serial.clone()]);
    }
    if let Some(shards) = extra_args.sharding {
        args.extend(["--shard-count".to_owned(), shards.to_string()]);
    }
    if extra_args.disable_teardown {
        args.push("--disable-teardown".to_owned());
    }
    if extra_args.host {
        args.extend(
            ["-n", "--prioritize-host-config", "--skip-host-arch-check"].map(str::to_owned),
        );
    }
    args.extend(extra_args.custom_args.iter().cloned());
    if extra_args.all_abi {
        args.push("--all-abi".to_owned());
    }
    if let Some(rerun) = extra_args.rerun {
        args.extend([
            "--retry-strategy".to_owned(),
            rerun.strategy().to_owned(),
            "--max-testcase-run-count".to_owned(),
            rerun.count().to_string(),
        ]);
    }
    if extra_args.collect_tests_only {
        args.push("--collect-tests-only".to_owned());
    }
    args
}

/// Merges tests that name the same module into a single entry.
///
/// If any of the merged entries runs the whole module, the merged entry does too. Otherwise the
/// filters are combined.
pub fn flatten_test_infos(tests: &[TestInfo]) -> Vec<TestInfo> {
    let mut by_name: BTreeMap<&str, Vec<&TestInfo>> = BTreeMap::new();
    for test in tests {
        by_name.entry(&test.test_name).or_default().push(test);
    }

    by_name
        .into_values()
        .filter_map(|group| {
            let (first, rest) = group.split_first()?;
            let mut merged = (*first).clone();
            let runs_whole_module = group.iter().any(|test| test.data.filters.is_empty());
            for test in rest {
                merged.build_targets.extend(test.build_targets.iter().cloned());
                merged.data.filters.extend(test.data.filters.iter().cloned());
                for arg in &test.data.module_args {
                    if !merged.data.module_args.contains(arg) {
                        merged.data.module_args.push(arg.clone());
                    }
                }
            }
            if runs_whole_module {
                merged.data.filters.clear();
            }
            Some(merged)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        options::RerunOption,
        test_info::{InstallLocation, TestFilter},
    };
    use pretty_assertions::assert_eq;

    fn runner() -> TradefedRunner {
        TradefedRunner::new(
            Utf8PathBuf::from("/tmp/atest_result"),
            TradefedConfig {
                log_level: "VERBOSE".to_owned(),
                early_device_release: false,
            },
        )
    }

    #[test]
    fn command_for_module() {
        let info = TestInfo::new("hello_world_test", "AtestTradefedTestRunner", ["hello_world_test"]);
        let commands = runner().generate_run_commands(&[info], &ExtraArgs::default());
        assert_eq!(
            commands,
            vec![
                "atest_tradefed.sh template/atest_device_test_base --template:map test=atest \
                 --template:map log_saver=template/log/atest_log_saver \
                 --atest-log-file-path=/tmp/atest_result/log --no-enable-granular-attempts \
                 --include-filter hello_world_test --skip-loading-config-jar \
                 --log-level-display VERBOSE --log-level VERBOSE --no-early-device-release"
                    .to_owned()
            ]
        );
    }

    #[test]
    fn filters_and_module_args() {
        let mut info = TestInfo::new("CtsFooTestCases", "AtestTradefedTestRunner", ["CtsFooTestCases"])
            .with_filters([TestFilter::new("a.b.FooTest", ["testA"])]);
        info.data.module_args = vec![
            ("include-filter".to_owned(), "a.b.BarTest".to_owned()),
            ("instrumentation-arg".to_owned(), "x:=y".to_owned()),
        ];
        info.test_finder = "INTEGRATION".to_owned();

        let args = runner().create_test_args(&[info], &ExtraArgs::default());
        assert_eq!(
            &args[..8],
            [
                "--include-filter",
                "CtsFooTestCases",
                "--include-filter",
                "CtsFooTestCases a.b.BarTest",
                "--module-arg",
                "CtsFooTestCases:instrumentation-arg:x:=y",
                "--atest-include-filter",
                "CtsFooTestCases:a.b.FooTest#testA",
            ]
        );
        assert!(!args.contains(&"--skip-loading-config-jar".to_owned()));
    }

    #[test]
    fn extra_args_mapping() {
        let extra_args = ExtraArgs {
            serial: vec!["emulator-5554".to_owned()],
            sharding: Some(2),
            host: true,
            rerun: Some(RerunOption::Iterations(3)),
            custom_args: vec!["--foo".to_owned()],
            ..Default::default()
        };
        assert_eq!(
            extra_tf_args(&extra_args),
            [
                "--serial",
                "emulator-5554",
                "--shard-count",
                "2",
                "-n",
                "--prioritize-host-config",
                "--skip-host-arch-check",
                "--foo",
                "--retry-strategy",
                "ITERATIONS",
                "--max-testcase-run-count",
                "3",
            ]
        );
    }

    #[test]
    fn mainline_and_host_template() {
        let info = TestInfo::new("Foo[bar.apex]", "AtestTradefedTestRunner", ["Foo"]);
        let extra_args = ExtraArgs {
            host: true,
            ..Default::default()
        };
        let command = &runner().generate_run_commands(&[info], &extra_args)[0];
        assert!(command.contains("template/atest_deviceless_test_base"));
        assert!(command.contains("--include-filter 'Foo[bar.apex]'"));
        assert!(command.contains("--enable-mainline-parameterized-modules"));
    }

    #[test]
    fn flattening() {
        let a = TestInfo::new("m", "AtestTradefedTestRunner", ["m"])
            .with_filters([TestFilter::class("A")]);
        let b = TestInfo::new("m", "AtestTradefedTestRunner", ["m", "dep"])
            .with_filters([TestFilter::class("B")]);
        let whole = TestInfo::new("n", "AtestTradefedTestRunner", ["n"]);
        let n_class = TestInfo::new("n", "AtestTradefedTestRunner", ["n"])
            .with_filters([TestFilter::class("C")]);

        let flat = flatten_test_infos(&[a, b, whole, n_class]);
        assert_eq!(flat.len(), 2);
        assert_eq!(
            flat[0].data.filters,
            BTreeSet::from([TestFilter::class("A"), TestFilter::class("B")])
        );
        assert!(flat[0].build_targets.contains("dep"));
        assert!(flat[1].data.filters.is_empty());
    }

    #[test]
    fn build_reqs_and_device() {
        let mut info = TestInfo::new("m", "AtestTradefedTestRunner", ["m", "MODULES-IN-a-b"]);
        let runner = runner();
        let reqs = runner.test_runner_build_reqs(std::slice::from_ref(&info));
        for req in ["m", "MODULES-IN-a-b", "tradefed-core", "atest-tradefed", "atest_tradefed.sh"] {
            assert!(reqs.contains(req), "{req} is required");
        }
        assert!(runner.requires_device_update(std::slice::from_ref(&info)));
        info.install_locations = [InstallLocation::Deviceless].into_iter().collect();
        assert!(!runner.requires_device_update(&[info]));
    }
}
