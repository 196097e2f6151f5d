// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::ExpectedError,
    output::{NO_HEADING, OutputContext, OutputOpts},
    soong_cli::{SoongCli, update_device},
};
use atest_metadata::AtestExitCode;
use atest_runner::{
    cache::TestInfoCache,
    config::AtestConfig,
    environment::AndroidEnvironment,
    exec_mode::AdbDeviceLister,
    finder::{FinderContext, RunnerOverride, SourceIndex},
    module_info::ModuleInfo,
    options::{ExtraArgs, RerunOption, RoboleafMode, RunOptions},
    plan::ExecutionPlan,
    runner::{RoboleafModuleMap, RunnerContext},
    translator::{CliTranslator, Prompter},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser};
use itertools::Itertools;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Find, build and run Android tests.
///
/// Tests are referenced by module name, class name, file path, package name or
/// TEST_MAPPING group. With no references, tests are read from the TEST_MAPPING files
/// around the current directory.
#[derive(Debug, Parser)]
#[command(
    name = "atest",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct AtestApp {
    /// Test references, e.g. `hello_world_test`, `FooTest#testBar` or `path/to/dir`
    #[arg(help_heading = None, value_name = "TESTS")]
    tests: Vec<String>,

    #[command(flatten)]
    select: SelectOpts,

    #[command(flatten)]
    exec: ExecOpts,

    #[command(flatten)]
    runner: RunnerOpts,

    /// Config file [default: $XDG_CONFIG_HOME/atest/config.toml]
    #[arg(long, value_name = "PATH", env = "ATEST_CONFIG")]
    config_file: Option<Utf8PathBuf>,

    #[command(flatten)]
    output: OutputOpts,

    /// Arguments passed to the test runner verbatim
    #[arg(help_heading = None, value_name = "RUNNER_ARGS", last = true)]
    custom_args: Vec<String>,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Test selection options")]
struct SelectOpts {
    /// Run tests from TEST_MAPPING files
    #[arg(long, short = 'p')]
    test_mapping: bool,

    /// Also read TEST_MAPPING files in subdirectories
    #[arg(long)]
    include_subdirs: bool,

    /// Forget cached results for the given references before resolving them
    #[arg(long, short = 'c')]
    clear_cache: bool,

    /// Don't suggest similar modules for references that can't be found
    #[arg(long)]
    no_fuzzy_search: bool,

    /// Run unit tests through Bazel
    #[arg(long)]
    bazel_mode: bool,

    /// Run converted modules through `b test`: off, on or dev
    #[arg(long, value_name = "MODE", default_value_t)]
    roboleaf_mode: RoboleafMode,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Execution options")]
struct ExecOpts {
    /// Only run tests that require a device
    #[arg(long, short = 'd', conflicts_with = "host")]
    device_only: bool,

    /// Run tests on the host, without a device
    #[arg(long)]
    host: bool,

    /// A virtual device is started before running
    #[arg(long)]
    start_avd: bool,

    /// A cloud device is created before running
    #[arg(long)]
    acloud_create: bool,

    /// Skip building the tests and their dependencies
    #[arg(long)]
    no_build: bool,

    /// Sync build artifacts to the device before running
    #[arg(long)]
    update_device: bool,

    /// Print the build targets and runner commands instead of running them
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Runner options")]
struct RunnerOpts {
    /// Device serial to run against (may be repeated)
    #[arg(long, short = 's', value_name = "SERIAL")]
    serial: Vec<String>,

    /// Number of shards to split tests across
    #[arg(long, value_name = "N")]
    sharding: Option<u32>,

    /// Run on every ABI the device supports
    #[arg(long, short = 'a')]
    all_abi: bool,

    /// Wait for a debugger to attach before running
    #[arg(long, short = 'D')]
    wait_for_debugger: bool,

    /// Skip install steps on the device
    #[arg(long)]
    disable_install: bool,

    /// Skip teardown steps on the device
    #[arg(long)]
    disable_teardown: bool,

    /// Run every test N times
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "10",
        conflicts_with_all = ["rerun_until_failure", "retry_any_failure"]
    )]
    iterations: Option<u32>,

    /// Rerun tests until one fails, at most N times
    #[arg(
        long,
        value_name = "N",
        num_args = 0..=1,
        default_missing_value = "10",
        conflicts_with = "retry_any_failure"
    )]
    rerun_until_failure: Option<u32>,

    /// Retry failed tests, at most N times
    #[arg(long, value_name = "N", num_args = 0..=1, default_missing_value = "10")]
    retry_any_failure: Option<u32>,

    /// Collect tests without running them
    #[arg(long)]
    collect_tests_only: bool,

    /// Use the minimal Tradefed template
    #[arg(long)]
    use_tf_min_base_template: bool,

    /// Run each test of a module separately instead of merging them
    #[arg(long)]
    no_group_test: bool,
}

impl RunnerOpts {
    fn rerun(&self) -> Option<RerunOption> {
        self.iterations
            .map(RerunOption::Iterations)
            .or(self.rerun_until_failure.map(RerunOption::RerunUntilFailure))
            .or(self.retry_any_failure.map(RerunOption::RetryAnyFailure))
    }
}

impl AtestApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    fn run_options(&self) -> RunOptions {
        RunOptions {
            tests: self.tests.clone(),
            test_mapping: self.select.test_mapping,
            include_subdirs: self.select.include_subdirs,
            clear_cache: self.select.clear_cache,
            fuzzy_search: !self.select.no_fuzzy_search,
            bazel_mode: self.select.bazel_mode,
            roboleaf_mode: self.select.roboleaf_mode,
            device_only: self.exec.device_only,
            start_avd: self.exec.start_avd,
            acloud_create: self.exec.acloud_create,
            extra: ExtraArgs {
                serial: self.runner.serial.clone(),
                sharding: self.runner.sharding,
                all_abi: self.runner.all_abi,
                host: self.exec.host,
                wait_for_debugger: self.runner.wait_for_debugger,
                disable_install: self.runner.disable_install,
                disable_teardown: self.runner.disable_teardown,
                rerun: self.runner.rerun(),
                collect_tests_only: self.runner.collect_tests_only,
                custom_args: self.custom_args.clone(),
                use_tf_min_base_template: self.runner.use_tf_min_base_template,
                group_test: !self.runner.no_group_test,
                dry_run: self.exec.dry_run,
            },
        }
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self) -> Result<i32> {
        let env = AndroidEnvironment::from_env()?;
        let cwd = AndroidEnvironment::current_dir()?;
        let rel_cwd = env.rel_cwd(&cwd)?;
        debug!("running from `{rel_cwd}` in {}", env.build_top());

        let config = AtestConfig::from_sources(self.config_file.as_deref())?;
        let options = self.run_options();
        let module_info = ModuleInfo::load(&env.module_info_path(), env.build_top())?;

        let misc_dir = if config.cache.enabled {
            config
                .cache
                .dir
                .clone()
                .or_else(TestInfoCache::default_misc_dir)
        } else {
            None
        };
        let cache = match &misc_dir {
            Some(misc_dir) => TestInfoCache::new(
                misc_dir,
                if options.bazel_mode { "bazel" } else { "normal" },
                &env.manifest_branch(),
                &env.build_target(),
            ),
            None => {
                debug!("test info cache is disabled");
                TestInfoCache::disabled()
            }
        };

        let source_index = misc_dir.as_ref().map(|misc_dir| {
            let index = SourceIndex::new(env.build_top(), &misc_dir.join("indexes"));
            if let Err(error) = index.spawn() {
                warn!("unable to start indexing the source tree: {error}");
            }
            index
        });

        let mut finders = FinderContext::new(&module_info, &cache, source_index.as_ref(), cwd.clone());
        if options.bazel_mode {
            finders = finders.with_runner_override(RunnerOverride::bazel());
        }

        let roboleaf = if options.roboleaf_mode == RoboleafMode::Off {
            RoboleafModuleMap::default()
        } else {
            RoboleafModuleMap::from_env(&env)
        };

        let prompter = DialoguerPrompter;
        let translator = CliTranslator::new(&finders, &module_info, &cache, &config, &prompter, cwd)
            .with_roboleaf(&roboleaf);
        let test_infos = translator.translate(&options)?;

        let ctx = RunnerContext {
            module_info: &module_info,
            target_testcases: env.target_testcases(),
            host_testcases: env.host_testcases(),
            results_dir: results_dir(),
            tradefed: config.tradefed.clone(),
            roboleaf: &roboleaf,
        };
        let plan = ExecutionPlan::create(&ctx, &options, &test_infos)?;
        let build_targets = plan.required_build_targets();

        if options.extra.dry_run {
            info!(
                target: NO_HEADING,
                "Would build targets: {}",
                build_targets.iter().join(" ")
            );
            plan.dry_run();
            return Ok(AtestExitCode::SUCCESS);
        }

        plan.ensure_device_available(&AdbDeviceLister)?;

        if self.exec.no_build {
            debug!("skipping build of {} targets", build_targets.len());
        } else if !build_targets.is_empty() {
            SoongCli::new(env.build_top(), &build_targets).build()?;
        }
        if self.exec.update_device && plan.requires_device_update() {
            update_device(env.build_top())?;
        }

        match plan.execute() {
            AtestExitCode::SUCCESS => Ok(AtestExitCode::SUCCESS),
            exit_code => Err(ExpectedError::TestRunFailed { exit_code }),
        }
    }
}

/// A fresh directory for runner logs and results.
fn results_dir() -> Utf8PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default();
    let base = Utf8PathBuf::try_from(std::env::temp_dir())
        .unwrap_or_else(|_| Utf8Path::new("/tmp").to_owned());
    base.join("atest_result").join(format!("{stamp}_{}", std::process::id()))
}

/// Asks the user on the terminal.
#[derive(Debug)]
struct DialoguerPrompter;

impl Prompter for DialoguerPrompter {
    fn confirm(&self, prompt: &str, default: bool) -> bool {
        match dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
        {
            Ok(answer) => answer,
            Err(error) => {
                debug!("unable to prompt, assuming {default}: {error}");
                default
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    #[test]
    fn verify_app() {
        AtestApp::command().debug_assert();
    }

    fn parse(args: &[&str]) -> RunOptions {
        AtestApp::try_parse_from(std::iter::once("atest").chain(args.iter().copied()))
            .expect("valid arguments")
            .run_options()
    }

    #[test]
    fn defaults() {
        let options = parse(&["hello_world_test"]);
        assert_eq!(
            options,
            RunOptions {
                tests: vec!["hello_world_test".to_owned()],
                fuzzy_search: true,
                ..Default::default()
            }
        );
        assert!(options.extra.group_test);
    }

    #[test]
    fn runner_args() {
        let options = parse(&[
            "FooTest#testBar",
            "--host",
            "-s",
            "emulator-5554",
            "--sharding",
            "2",
            "--no-group-test",
            "--",
            "--module-arg",
            "Foo:bar:baz",
        ]);
        assert_eq!(options.tests, ["FooTest#testBar"]);
        assert!(options.extra.host);
        assert!(!options.extra.group_test);
        assert_eq!(options.extra.serial, ["emulator-5554"]);
        assert_eq!(options.extra.sharding, Some(2));
        assert_eq!(options.extra.custom_args, ["--module-arg", "Foo:bar:baz"]);
    }

    #[test_case(&["--iterations"], Some(RerunOption::Iterations(10)) ; "iterations default")]
    #[test_case(&["--iterations=3"], Some(RerunOption::Iterations(3)) ; "iterations")]
    #[test_case(&["--rerun-until-failure=5"], Some(RerunOption::RerunUntilFailure(5)) ; "rerun until failure")]
    #[test_case(&["--retry-any-failure"], Some(RerunOption::RetryAnyFailure(10)) ; "retry any failure")]
    #[test_case(&[], None ; "none")]
    fn rerun(args: &[&str], expected: Option<RerunOption>) {
        let mut all = vec!["hello_world_test"];
        all.extend_from_slice(args);
        assert_eq!(parse(&all).extra.rerun, expected);
    }

    #[test_case(&["--iterations", "--retry-any-failure"] ; "two rerun options")]
    #[test_case(&["--host", "--device-only"] ; "host and device only")]
    #[test_case(&["--roboleaf-mode", "sometimes"] ; "unknown roboleaf mode")]
    fn conflicts(args: &[&str]) {
        let result =
            AtestApp::try_parse_from(std::iter::once("atest").chain(args.iter().copied()));
        assert!(result.is_err(), "{args:?} should be rejected");
    }

    #[test]
    fn roboleaf_mode() {
        assert_eq!(
            parse(&["--roboleaf-mode", "dev", "FooTests"]).roboleaf_mode,
            RoboleafMode::Dev
        );
    }
}
