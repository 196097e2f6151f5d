// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Execution plans: resolved tests grouped into runner invocations, ready to build and run.
//!
//! A [`ModulePlan`] runs every test in one batch. A [`TestMappingPlan`] splits TEST_MAPPING tests
//! into tests that need a device and tests that don't, and runs the two partitions one after the
//! other.

use crate::{
    errors::PlanError,
    exec_mode::{self, DeviceLister},
    options::RunOptions,
    runner::{CollectingReporter, RunnerContext, TestRunnerInvocation, create_invocations},
    test_info::TestInfo,
};
use atest_metadata::AtestExitCode;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// The name of the partition of TEST_MAPPING tests that need a device.
pub const DEVICE_TESTS: &str = "tests that require device";

/// The name of the partition of TEST_MAPPING tests that run on the host.
pub const HOST_TESTS: &str = "tests that do NOT require device";

/// A plan for running resolved tests.
#[derive(Debug)]
pub enum ExecutionPlan<'a> {
    /// Tests given directly on the command line.
    Module(ModulePlan<'a>),

    /// Tests collected from TEST_MAPPING files.
    TestMapping(TestMappingPlan<'a>),
}

impl<'a> ExecutionPlan<'a> {
    /// Creates the plan for `test_infos`.
    ///
    /// Execution modes are validated here. For direct runs this may turn on `--host` when every
    /// test is host-only.
    pub fn create(
        ctx: &RunnerContext<'a>,
        options: &RunOptions,
        test_infos: &BTreeSet<TestInfo>,
    ) -> Result<Self, PlanError> {
        if options.is_test_mapping() {
            TestMappingPlan::create(ctx, options, test_infos).map(Self::TestMapping)
        } else {
            ModulePlan::create(ctx, options, test_infos).map(Self::Module)
        }
    }

    /// The options the plan runs with, after validation.
    pub fn options(&self) -> &RunOptions {
        match self {
            Self::Module(plan) => &plan.options,
            Self::TestMapping(plan) => &plan.options,
        }
    }

    fn invocations(&self) -> Box<dyn Iterator<Item = &TestRunnerInvocation<'a>> + '_> {
        match self {
            Self::Module(plan) => Box::new(plan.invocations.iter()),
            Self::TestMapping(plan) => Box::new(
                plan.partitions
                    .iter()
                    .flat_map(|partition| partition.invocations.iter()),
            ),
        }
    }

    /// Everything that must be built before running: the union of every runner's requirements.
    pub fn required_build_targets(&self) -> BTreeSet<String> {
        self.invocations()
            .flat_map(|invocation| invocation.test_runner_reqs())
            .collect()
    }

    /// Returns true if the device must be synced before running.
    pub fn requires_device_update(&self) -> bool {
        self.invocations()
            .any(|invocation| invocation.requires_device_update())
    }

    /// Checks that a device is attached if any planned test needs one.
    pub fn ensure_device_available(&self, lister: &dyn DeviceLister) -> Result<(), PlanError> {
        let tests: Vec<TestInfo> = self
            .invocations()
            .flat_map(|invocation| invocation.tests().iter().cloned())
            .collect();
        exec_mode::ensure_device_available(self.options(), &tests, lister)
    }

    /// Prints the commands that would run, and returns them.
    pub fn dry_run(&self) -> Vec<String> {
        let commands: Vec<String> = self
            .invocations()
            .flat_map(|invocation| invocation.run_commands())
            .collect();
        for command in &commands {
            info!(target: "atest::no_heading", "Would run test via command: {command}");
        }
        commands
    }

    /// Runs every invocation, returning the combined exit code.
    pub fn execute(&self) -> i32 {
        match self {
            Self::Module(plan) => plan.execute(),
            Self::TestMapping(plan) => plan.execute(),
        }
    }
}

/// A plan for tests given directly on the command line.
#[derive(Debug)]
pub struct ModulePlan<'a> {
    options: RunOptions,
    invocations: Vec<TestRunnerInvocation<'a>>,
}

impl<'a> ModulePlan<'a> {
    /// Validates `test_infos` as a single batch and groups them by runner.
    ///
    /// Validation is skipped for dry runs, which never touch a device.
    pub fn create(
        ctx: &RunnerContext<'a>,
        options: &RunOptions,
        test_infos: &BTreeSet<TestInfo>,
    ) -> Result<Self, PlanError> {
        let mut options = options.clone();
        if !options.extra.dry_run {
            let tests: Vec<TestInfo> = test_infos.iter().cloned().collect();
            exec_mode::validate(&mut options.extra.host, &tests, None)?;
        }
        let invocations = create_invocations(ctx, &options.extra, test_infos)?;
        Ok(Self {
            options,
            invocations,
        })
    }

    fn execute(&self) -> i32 {
        let mut reporter = CollectingReporter::new();
        let mut exit_code = AtestExitCode::SUCCESS;
        for invocation in &self.invocations {
            exit_code |= invocation.run_all_tests(&mut reporter);
        }
        info!(target: "atest::no_heading", "\n{}", reporter.summary());
        exit_code
    }
}

/// One half of a TEST_MAPPING run.
#[derive(Debug)]
pub struct Partition<'a> {
    name: &'static str,
    test_count: usize,
    invocations: Vec<TestRunnerInvocation<'a>>,
}

impl<'a> Partition<'a> {
    pub(crate) fn new(name: &'static str, invocations: Vec<TestRunnerInvocation<'a>>) -> Self {
        let test_count = invocations
            .iter()
            .map(|invocation| invocation.tests().len())
            .sum();
        Self {
            name,
            test_count,
            invocations,
        }
    }

    /// The partition name, e.g. [`DEVICE_TESTS`].
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of tests in the partition.
    pub fn test_count(&self) -> usize {
        self.test_count
    }
}

/// A plan for tests collected from TEST_MAPPING files.
#[derive(Debug)]
pub struct TestMappingPlan<'a> {
    options: RunOptions,
    partitions: Vec<Partition<'a>>,
}

impl<'a> TestMappingPlan<'a> {
    /// Splits `test_infos` by [`TestInfo::host`], validates each side on its own, and groups each
    /// side by runner.
    ///
    /// `--host` skips the device tests and `--device-only` skips the host tests.
    pub fn create(
        ctx: &RunnerContext<'a>,
        options: &RunOptions,
        test_infos: &BTreeSet<TestInfo>,
    ) -> Result<Self, PlanError> {
        let (host_tests, device_tests): (Vec<TestInfo>, Vec<TestInfo>) =
            test_infos.iter().cloned().partition(|info| info.host);

        let mut host = options.extra.host;
        if !device_tests.is_empty() && !host {
            exec_mode::validate(&mut host, &device_tests, Some(false))?;
        }
        if !host_tests.is_empty() {
            exec_mode::validate(&mut host, &host_tests, Some(true))?;
        }

        let mut host_args = options.extra.clone();
        host_args.host = true;
        let mut runs = vec![(HOST_TESTS, host_tests, host_args)];
        if options.extra.host {
            info!("Option `--host` specified. Skip running device tests.");
        } else if options.device_only {
            runs = vec![(DEVICE_TESTS, device_tests, options.extra.clone())];
            info!("Option `--device-only` specified. Skip running deviceless tests.");
        } else {
            runs.push((DEVICE_TESTS, device_tests, options.extra.clone()));
        }

        let mut partitions = Vec::new();
        for (name, tests, extra_args) in runs {
            if tests.is_empty() {
                continue;
            }
            partitions.push(Partition::new(
                name,
                create_invocations(ctx, &extra_args, &tests)?,
            ));
        }
        Ok(Self {
            options: options.clone(),
            partitions,
        })
    }

    #[cfg(test)]
    fn from_partitions(options: RunOptions, partitions: Vec<Partition<'a>>) -> Self {
        Self {
            options,
            partitions,
        }
    }

    /// The partitions that will run, in order.
    pub fn partitions(&self) -> &[Partition<'a>] {
        &self.partitions
    }

    fn execute(&self) -> i32 {
        let (exit_code, failed) = self.run_partitions();
        if !failed.is_empty() {
            info!(
                target: "atest::no_heading",
                "{}\nFollowing tests failed:\n{}",
                "=".repeat(30),
                failed.join("\n"),
            );
        }
        exit_code
    }

    /// Runs each partition in turn. Returns the combined exit code and the names of the
    /// partitions that failed.
    fn run_partitions(&self) -> (i32, Vec<&'static str>) {
        let mut results = Vec::new();
        for partition in &self.partitions {
            info!(
                target: "atest::no_heading",
                "\nRunning {} {}.",
                partition.test_count,
                partition.name,
            );
            for invocation in &partition.invocations {
                for test in invocation.tests() {
                    debug!("{test:?}");
                }
            }
            let mut reporter = CollectingReporter::new();
            let mut exit_code = AtestExitCode::SUCCESS;
            for invocation in &partition.invocations {
                exit_code |= invocation.run_all_tests(&mut reporter);
            }
            results.push((partition.name, exit_code, reporter));
        }

        let mut all_exit_code = AtestExitCode::SUCCESS;
        let mut failed = Vec::new();
        for (name, exit_code, reporter) in results {
            info!(target: "atest::no_heading", "\nResults from {name}:\n{}", reporter.summary());
            let result = if reporter.is_success() {
                exit_code
            } else {
                exit_code | AtestExitCode::TEST_FAILURE
            };
            if result != AtestExitCode::SUCCESS {
                failed.push(name);
            }
            all_exit_code |= result;
        }
        (all_exit_code, failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::TradefedConfig,
        errors::{DeviceListError, ExecModeError, RunnerError},
        module_info::ModuleInfo,
        options::ExtraArgs,
        runner::{ResultReporter, RoboleafModuleMap, TestRunner},
        test_info::InstallLocation,
    };
    use camino::Utf8PathBuf;
    use pretty_assertions::assert_eq;

    fn context<'a>(module_info: &'a ModuleInfo, roboleaf: &'a RoboleafModuleMap) -> RunnerContext<'a> {
        RunnerContext {
            module_info,
            target_testcases: Utf8PathBuf::from("/out/target/product/x/testcases"),
            host_testcases: Some(Utf8PathBuf::from("/out/host/linux-x86/testcases")),
            results_dir: Utf8PathBuf::from("/tmp/atest_result"),
            tradefed: TradefedConfig {
                log_level: "VERBOSE".to_owned(),
                early_device_release: false,
            },
            roboleaf,
        }
    }

    fn info(name: &str, location: InstallLocation, host: bool) -> TestInfo {
        let mut info = TestInfo::new(name, "AtestTradefedTestRunner", [name]);
        info.install_locations = [location].into_iter().collect();
        info.from_test_mapping = true;
        info.host = host;
        info
    }

    #[test]
    fn module_plan_turns_on_host() {
        let module_info = ModuleInfo::default();
        let roboleaf = RoboleafModuleMap::default();
        let ctx = context(&module_info, &roboleaf);
        let options = RunOptions {
            tests: vec!["host_test".to_owned()],
            ..Default::default()
        };
        let infos = BTreeSet::from([info("host_test", InstallLocation::Deviceless, false)]);

        let plan = ExecutionPlan::create(&ctx, &options, &infos).expect("valid plan");
        assert!(matches!(plan, ExecutionPlan::Module(_)));
        assert!(plan.options().extra.host);
        assert!(!plan.requires_device_update());
        assert!(plan.required_build_targets().contains("host_test"));
        assert!(plan.required_build_targets().contains("atest-tradefed"));
        plan.ensure_device_available(&NoDevices)
            .expect("host runs need no device");
    }

    #[test]
    fn dry_runs_skip_validation() {
        let module_info = ModuleInfo::default();
        let roboleaf = RoboleafModuleMap::default();
        let ctx = context(&module_info, &roboleaf);
        let infos = BTreeSet::from([
            info("device_test", InstallLocation::Device, false),
            info("host_test", InstallLocation::Deviceless, false),
        ]);

        let options = RunOptions {
            tests: vec!["device_test".to_owned(), "host_test".to_owned()],
            ..Default::default()
        };
        let error = ExecutionPlan::create(&ctx, &options, &infos).unwrap_err();
        assert!(matches!(
            error,
            PlanError::ExecMode(ExecModeError::MixedDeviceRequirements)
        ));

        let options = RunOptions {
            extra: ExtraArgs {
                dry_run: true,
                ..Default::default()
            },
            ..options
        };
        let plan = ExecutionPlan::create(&ctx, &options, &infos).expect("dry runs aren't validated");
        assert_eq!(plan.dry_run().len(), 1);
    }

    #[test]
    fn test_mapping_partitions() {
        let module_info = ModuleInfo::default();
        let roboleaf = RoboleafModuleMap::default();
        let ctx = context(&module_info, &roboleaf);
        let infos = BTreeSet::from([
            info("device_test", InstallLocation::Device, false),
            info("host_test", InstallLocation::Deviceless, true),
        ]);

        let options = RunOptions {
            test_mapping: true,
            ..Default::default()
        };
        let ExecutionPlan::TestMapping(plan) =
            ExecutionPlan::create(&ctx, &options, &infos).expect("valid plan")
        else {
            panic!("TEST_MAPPING runs get a TEST_MAPPING plan");
        };
        let names: Vec<_> = plan.partitions().iter().map(Partition::name).collect();
        assert_eq!(names, [HOST_TESTS, DEVICE_TESTS]);

        let device_only = RunOptions {
            device_only: true,
            ..options.clone()
        };
        let plan = TestMappingPlan::create(&ctx, &device_only, &infos).expect("valid plan");
        let names: Vec<_> = plan.partitions().iter().map(Partition::name).collect();
        assert_eq!(names, [DEVICE_TESTS]);

        let host = RunOptions {
            extra: ExtraArgs {
                host: true,
                ..Default::default()
            },
            ..options.clone()
        };
        let plan = TestMappingPlan::create(&ctx, &host, &infos).expect("valid plan");
        let names: Vec<_> = plan.partitions().iter().map(Partition::name).collect();
        assert_eq!(names, [HOST_TESTS]);
    }

    #[test]
    fn test_mapping_partitions_are_validated_separately() {
        let module_info = ModuleInfo::default();
        let roboleaf = RoboleafModuleMap::default();
        let ctx = context(&module_info, &roboleaf);
        let options = RunOptions {
            test_mapping: true,
            ..Default::default()
        };

        let misplaced = BTreeSet::from([info("device_test", InstallLocation::Device, true)]);
        let error = TestMappingPlan::create(&ctx, &options, &misplaced).unwrap_err();
        assert!(matches!(
            error,
            PlanError::ExecMode(ExecModeError::DeviceOnlyTestsOnHost { .. })
        ));

        let misplaced = BTreeSet::from([info("host_test", InstallLocation::Deviceless, false)]);
        let error = TestMappingPlan::create(&ctx, &options, &misplaced).unwrap_err();
        assert!(matches!(
            error,
            PlanError::ExecMode(ExecModeError::HostOnlyTestsOnDevice { .. })
        ));
    }

    #[derive(Debug)]
    struct NoDevices;

    impl DeviceLister for NoDevices {
        fn list_devices(&self) -> Result<Vec<String>, DeviceListError> {
            Ok(Vec::new())
        }
    }

    #[derive(Debug)]
    struct FixedExitRunner(i32);

    impl TestRunner for FixedExitRunner {
        fn name(&self) -> &'static str {
            "AtestTradefedTestRunner"
        }

        fn run_tests(
            &self,
            _tests: &[TestInfo],
            _extra_args: &ExtraArgs,
            _reporter: &mut dyn ResultReporter,
        ) -> Result<i32, RunnerError> {
            Ok(self.0)
        }

        fn generate_run_commands(&self, _tests: &[TestInfo], _extra_args: &ExtraArgs) -> Vec<String> {
            Vec::new()
        }

        fn test_runner_build_reqs(&self, _tests: &[TestInfo]) -> BTreeSet<String> {
            BTreeSet::new()
        }

        fn requires_device_update(&self, _tests: &[TestInfo]) -> bool {
            false
        }
    }

    fn partition(name: &'static str, exit_code: i32) -> Partition<'static> {
        Partition::new(
            name,
            vec![TestRunnerInvocation::new(
                Box::new(FixedExitRunner(exit_code)),
                ExtraArgs::default(),
                vec![info(name, InstallLocation::Device, false)],
            )],
        )
    }

    #[test]
    fn exit_codes_are_combined() {
        let plan = TestMappingPlan::from_partitions(
            RunOptions::default(),
            vec![partition(HOST_TESTS, 0), partition(DEVICE_TESTS, 4)],
        );
        assert_eq!(plan.run_partitions(), (4 | AtestExitCode::TEST_FAILURE, vec![DEVICE_TESTS]));

        let plan = TestMappingPlan::from_partitions(
            RunOptions::default(),
            vec![partition(HOST_TESTS, 0), partition(DEVICE_TESTS, 0)],
        );
        assert_eq!(plan.run_partitions(), (AtestExitCode::SUCCESS, Vec::new()));
        assert_eq!(plan.partitions()[0].test_count(), 1);
    }
}
