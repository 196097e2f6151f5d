// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checks that resolved tests can run together, on the host or against a device.

use crate::{
    errors::{DeviceListError, ExecModeError, PlanError},
    options::RunOptions,
    test_info::{ExecMode, TestInfo},
};
use std::{collections::BTreeSet, fmt};
use tracing::{debug, trace};

/// Validates the execution modes of `test_infos`.
///
/// `host_tests` is `Some(true)` when the tests are known to be host tests, `Some(false)` when
/// they are known to be device tests, and `None` when it's up to this check. In the last case, a
/// batch made only of host-only tests turns `host` on.
pub fn validate(
    host: &mut bool,
    test_infos: &[TestInfo],
    host_tests: Option<bool>,
) -> Result<(), ExecModeError> {
    let modes: BTreeSet<ExecMode> = test_infos
        .iter()
        .map(TestInfo::supported_exec_mode)
        .collect();

    if (host_tests == Some(true) || *host) && modes.contains(&ExecMode::Device) {
        return Err(ExecModeError::DeviceOnlyTestsOnHost {
            tests: tests_with_mode(test_infos, ExecMode::Device),
        });
    }
    if modes.contains(&ExecMode::Device) && modes.contains(&ExecMode::Deviceless) {
        return Err(ExecModeError::MixedDeviceRequirements);
    }
    if host_tests == Some(false) && modes.contains(&ExecMode::Deviceless) {
        return Err(ExecModeError::HostOnlyTestsOnDevice {
            tests: tests_with_mode(test_infos, ExecMode::Deviceless),
        });
    }
    if !*host
        && host_tests.is_none()
        && !modes.is_empty()
        && modes.iter().all(|mode| *mode == ExecMode::Deviceless)
    {
        debug!("appending --host for deviceless tests");
        *host = true;
    }
    Ok(())
}

fn tests_with_mode(test_infos: &[TestInfo], mode: ExecMode) -> Vec<String> {
    test_infos
        .iter()
        .filter(|info| info.supported_exec_mode() == mode)
        .map(|info| info.test_name.clone())
        .collect()
}

/// Lists attached devices.
pub trait DeviceLister: fmt::Debug {
    /// Returns the serials of attached devices.
    fn list_devices(&self) -> Result<Vec<String>, DeviceListError>;
}

/// Lists devices with `adb devices`.
#[derive(Clone, Copy, Debug, Default)]
pub struct AdbDeviceLister;

impl DeviceLister for AdbDeviceLister {
    fn list_devices(&self) -> Result<Vec<String>, DeviceListError> {
        let expression = duct::cmd!("adb", "devices");
        trace!("Executing command: {:?}", expression);
        let output = expression
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|error| DeviceListError::new("adb devices", error))?;
        Ok(parse_adb_devices(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Parses the output of `adb devices`, keeping devices in the `device` state.
fn parse_adb_devices(output: &str) -> Vec<String> {
    output
        .lines()
        .skip_while(|line| !line.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(serial), Some("device")) => Some(serial.to_owned()),
                _ => None,
            }
        })
        .collect()
}

/// Ensures a device is attached if any of `test_infos` can only run on a device.
///
/// Tests that also run on the host don't require a device by themselves, but are listed in the
/// error alongside the device-only tests. Nothing is required for dry runs, host runs, or when a
/// device is about to be created.
pub fn ensure_device_available(
    options: &RunOptions,
    test_infos: &[TestInfo],
    lister: &dyn DeviceLister,
) -> Result<(), PlanError> {
    if options.extra.dry_run || options.extra.host || options.start_avd || options.acloud_create {
        return Ok(());
    }
    if !test_infos
        .iter()
        .any(|info| info.supported_exec_mode() == ExecMode::Device)
    {
        return Ok(());
    }
    if lister.list_devices()?.is_empty() {
        let device_tests = test_infos
            .iter()
            .filter(|info| info.supported_exec_mode() != ExecMode::Deviceless)
            .map(|info| info.test_name.clone())
            .collect();
        return Err(ExecModeError::DeviceNotFound {
            tests: device_tests,
        }
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_info::InstallLocation;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn info(name: &str, locations: &[InstallLocation]) -> TestInfo {
        let mut info = TestInfo::new(name, "AtestTradefedTestRunner", [name]);
        info.install_locations = locations.iter().copied().collect();
        info
    }

    fn host_only(name: &str) -> TestInfo {
        info(name, &[InstallLocation::Deviceless])
    }

    fn device_only(name: &str) -> TestInfo {
        info(name, &[InstallLocation::Device])
    }

    fn both(name: &str) -> TestInfo {
        info(name, &[InstallLocation::Device, InstallLocation::Deviceless])
    }

    #[test]
    fn deviceless_batch_turns_on_host() {
        let mut host = false;
        validate(&mut host, &[host_only("a"), host_only("b")], None).expect("valid");
        assert!(host);
    }

    #[test]
    fn mixed_with_both_keeps_device() {
        let mut host = false;
        validate(&mut host, &[host_only("a"), both("b")], None).expect("valid");
        assert!(!host);
        validate(&mut host, &[device_only("a"), both("b")], None).expect("valid");
        assert!(!host);
    }

    #[test_case(false, Some(true) ; "host tests")]
    #[test_case(true, None ; "host flag")]
    fn device_only_on_host(mut host: bool, host_tests: Option<bool>) {
        let before = host;
        let error = validate(&mut host, &[device_only("dev"), both("b")], host_tests).unwrap_err();
        assert_eq!(
            error,
            ExecModeError::DeviceOnlyTestsOnHost {
                tests: vec!["dev".to_owned()]
            }
        );
        assert_eq!(host, before);
    }

    #[test]
    fn mixed_requirements() {
        let mut host = false;
        assert_eq!(
            validate(&mut host, &[device_only("a"), host_only("b")], None),
            Err(ExecModeError::MixedDeviceRequirements)
        );
    }

    #[test]
    fn host_only_as_device_tests() {
        let mut host = false;
        assert_eq!(
            validate(&mut host, &[host_only("b")], Some(false)),
            Err(ExecModeError::HostOnlyTestsOnDevice {
                tests: vec!["b".to_owned()]
            })
        );
        validate(&mut host, &[both("b")], Some(false)).expect("valid");
        assert!(!host);
    }

    #[test]
    fn adb_output() {
        let output = indoc! {"
            * daemon started successfully
            List of devices attached
            emulator-5554\tdevice
            0123456789\tunauthorized
            HT7A1A\tdevice

        "};
        assert_eq!(parse_adb_devices(output), ["emulator-5554", "HT7A1A"]);
    }

    #[derive(Debug)]
    struct FixedDevices(Vec<String>);

    impl DeviceLister for FixedDevices {
        fn list_devices(&self) -> Result<Vec<String>, DeviceListError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn device_availability() {
        let options = RunOptions::default();
        let no_devices = FixedDevices(Vec::new());
        let tests = [device_only("dev"), host_only("host")];

        let error = ensure_device_available(&options, &tests, &no_devices).unwrap_err();
        assert!(
            matches!(error, PlanError::ExecMode(ExecModeError::DeviceNotFound { ref tests }) if tests == &["dev"])
        );
        ensure_device_available(&options, &tests, &FixedDevices(vec!["emulator-5554".to_owned()]))
            .expect("a device is attached");
        ensure_device_available(&options, &[host_only("host")], &no_devices)
            .expect("no device is needed");
        ensure_device_available(&options, &[both("both"), host_only("host")], &no_devices)
            .expect("tests that also run on the host don't need a device");

        let mut robolectric = device_only("robo");
        robolectric.test_runner = "RobolectricTestRunner".to_owned();
        let error = ensure_device_available(&options, &[robolectric, both("both")], &no_devices)
            .unwrap_err();
        assert!(
            matches!(error, PlanError::ExecMode(ExecModeError::DeviceNotFound { ref tests }) if tests == &["robo", "both"]),
            "device-only tests need a device whatever their runner"
        );

        let avd = RunOptions {
            start_avd: true,
            ..Default::default()
        };
        ensure_device_available(&avd, &tests, &no_devices).expect("a device will be started");
    }
}
