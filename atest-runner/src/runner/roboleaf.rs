// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Running converted modules with `b test`.

use super::{ResultReporter, RunnerKind, TestRunner, run_commands};
use crate::{
    environment::AndroidEnvironment,
    errors::RunnerError,
    options::{ExtraArgs, RoboleafMode},
    test_info::TestInfo,
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
};
use swrite::{SWrite, swrite};
use tracing::{debug, warn};

/// The converted-module map, relative to the out dir.
pub const MODULE_MAP_PATH: &str = "soong/soong_injection/metrics/converted_modules_path_map.json";

/// The launched-module allowlist, relative to the build top.
pub const ALLOWLIST_PATH: &str = "tools/asuite/atest/test_runners/roboleaf_launched.txt";

/// The finder name recorded on tests resolved as converted modules.
pub const ROBOLEAF_FINDER: &str = "ROBOLEAF";

/// Modules converted to Bazel, and the subset that has launched.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoboleafModuleMap {
    /// Module name to Bazel package, e.g. `//frameworks/base`.
    converted: BTreeMap<String, String>,
    /// Fully qualified labels of launched modules.
    launched: BTreeSet<String>,
}

impl RoboleafModuleMap {
    /// Creates a map from its parts.
    pub fn new(
        converted: impl IntoIterator<Item = (String, String)>,
        launched: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            converted: converted.into_iter().collect(),
            launched: launched.into_iter().collect(),
        }
    }

    /// Loads the map from the default locations for `env`.
    pub fn from_env(env: &AndroidEnvironment) -> Self {
        Self::load(
            &env.out_dir().join(MODULE_MAP_PATH),
            &env.build_top().join(ALLOWLIST_PATH),
        )
    }

    /// Loads the map. Missing or invalid files leave the corresponding part empty.
    pub fn load(map_path: &Utf8Path, allowlist_path: &Utf8Path) -> Self {
        let converted = match fs::read_to_string(map_path) {
            Ok(contents) => match serde_json::from_str::<BTreeMap<String, String>>(&contents) {
                Ok(converted) => converted,
                Err(err) => {
                    warn!("ignoring invalid converted-module map `{map_path}`: {err}");
                    BTreeMap::new()
                }
            },
            Err(err) => {
                debug!("no converted-module map at `{map_path}`: {err}");
                BTreeMap::new()
            }
        };
        let launched = match fs::read_to_string(allowlist_path) {
            Ok(contents) => contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_owned)
                .collect(),
            Err(err) => {
                debug!("no roboleaf allowlist at `{allowlist_path}`: {err}");
                BTreeSet::new()
            }
        };
        Self {
            converted,
            launched,
        }
    }

    /// The Bazel label for `module`, e.g. `//frameworks/base:FooTests`.
    pub fn label(&self, module: &str) -> Option<String> {
        self.converted
            .get(module)
            .map(|package| format!("{package}:{module}"))
    }

    /// Returns true if `module` may run through `b test` in `mode`.
    pub fn is_eligible(&self, mode: RoboleafMode, module: &str) -> bool {
        match mode {
            RoboleafMode::Off => false,
            RoboleafMode::Dev => self.converted.contains_key(module),
            RoboleafMode::On => self
                .label(module)
                .is_some_and(|label| self.launched.contains(&label)),
        }
    }

    /// Returns a test for each of `test_refs` if every one of them is eligible, or nothing.
    pub fn are_all_tests_supported<S: AsRef<str>>(
        &self,
        mode: RoboleafMode,
        test_refs: &[S],
    ) -> BTreeMap<String, TestInfo> {
        if test_refs.is_empty()
            || !test_refs
                .iter()
                .all(|test_ref| self.is_eligible(mode, test_ref.as_ref()))
        {
            return BTreeMap::new();
        }
        test_refs
            .iter()
            .map(|test_ref| {
                let test_ref = test_ref.as_ref();
                let mut info = TestInfo::new(
                    test_ref,
                    RunnerKind::Roboleaf.name(),
                    std::iter::empty::<String>(),
                );
                info.test_finder = ROBOLEAF_FINDER.to_owned();
                (test_ref.to_owned(), info)
            })
            .collect()
    }
}

/// Runs converted modules through `b test`.
#[derive(Debug)]
pub struct RoboleafRunner<'a> {
    module_map: &'a RoboleafModuleMap,
    build_top: Utf8PathBuf,
}

impl<'a> RoboleafRunner<'a> {
    /// Creates a runner that invokes `b` from `build_top`.
    pub fn new(module_map: &'a RoboleafModuleMap, build_top: Utf8PathBuf) -> Self {
        Self {
            module_map,
            build_top,
        }
    }
}

impl TestRunner for RoboleafRunner<'_> {
    fn name(&self) -> &'static str {
        RunnerKind::Roboleaf.name()
    }

    fn run_tests(
        &self,
        tests: &[TestInfo],
        extra_args: &ExtraArgs,
        reporter: &mut dyn ResultReporter,
    ) -> Result<i32, RunnerError> {
        reporter.register_unsupported_runner(self.name());
        run_commands(
            &self.generate_run_commands(tests, extra_args),
            Some(&self.build_top),
            None,
        )
    }

    fn generate_run_commands(&self, tests: &[TestInfo], extra_args: &ExtraArgs) -> Vec<String> {
        let mut command = "b test".to_owned();
        for test in tests {
            match self.module_map.label(&test.test_name) {
                Some(label) => swrite!(command, " {label}"),
                None => warn!("{} is not a converted module, skipping it", test.test_name),
            }
        }
        command.push_str(" --tool_tag=atest");
        if extra_args.host {
            command.push_str(" --config=deviceless_tests");
        }
        vec![command]
    }

    fn test_runner_build_reqs(&self, _tests: &[TestInfo]) -> BTreeSet<String> {
        BTreeSet::new()
    }

    fn requires_device_update(&self, _tests: &[TestInfo]) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn module_map() -> RoboleafModuleMap {
        RoboleafModuleMap::new(
            [
                ("FooTests".to_owned(), "//frameworks/foo".to_owned()),
                ("BarTests".to_owned(), "//frameworks/bar".to_owned()),
            ],
            ["//frameworks/foo:FooTests".to_owned()],
        )
    }

    #[test_case(RoboleafMode::Off, &["FooTests"], false ; "off")]
    #[test_case(RoboleafMode::On, &["FooTests"], true ; "on launched")]
    #[test_case(RoboleafMode::On, &["FooTests", "BarTests"], false ; "on not launched")]
    #[test_case(RoboleafMode::Dev, &["FooTests", "BarTests"], true ; "dev converted")]
    #[test_case(RoboleafMode::Dev, &["FooTests", "BazTests"], false ; "dev not converted")]
    fn eligibility(mode: RoboleafMode, refs: &[&str], supported: bool) {
        let tests = module_map().are_all_tests_supported(mode, refs);
        assert_eq!(!tests.is_empty(), supported);
        if supported {
            assert_eq!(tests.len(), refs.len());
            assert!(tests.values().all(|info| info.test_runner == "RoboleafTestRunner"));
        }
    }

    #[test]
    fn load_from_files() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let map_path = dir.path().join("map.json");
        let allowlist_path = dir.path().join("launched.txt");
        fs::write(
            &map_path,
            indoc! {r#"
                {"FooTests": "//frameworks/foo", "BarTests": "//frameworks/bar"}
            "#},
        )
        .expect("wrote map");
        fs::write(&allowlist_path, "# launched\n//frameworks/foo:FooTests\n\n")
            .expect("wrote allowlist");
        assert_eq!(RoboleafModuleMap::load(&map_path, &allowlist_path), module_map());

        let missing = RoboleafModuleMap::load(&dir.path().join("nope"), &allowlist_path);
        assert_eq!(missing.label("FooTests"), None);
    }

    #[test]
    fn command() {
        let map = module_map();
        let runner = RoboleafRunner::new(&map, Utf8PathBuf::from("/src"));
        let tests: Vec<TestInfo> = map
            .are_all_tests_supported(RoboleafMode::Dev, &["BarTests", "FooTests"])
            .into_values()
            .collect();
        let extra_args = ExtraArgs {
            host: true,
            ..Default::default()
        };
        assert_eq!(
            runner.generate_run_commands(&tests, &extra_args),
            ["b test //frameworks/bar:BarTests //frameworks/foo:FooTests --tool_tag=atest \
              --config=deviceless_tests"]
        );
        assert!(runner.test_runner_build_reqs(&tests).is_empty());
    }
}
