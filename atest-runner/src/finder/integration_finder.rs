// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Tradefed integration configs.

use super::{module_finder::FindResult, reference_type::split_methods};
use crate::{runner::RunnerKind, test_info::TestFilter, test_info::TestInfo};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// Directories holding Tradefed integration configs, relative to the build top.
pub const INTEGRATION_DIRS: &[&str] = &[
    "tools/tradefederation/core/res/config",
    "tools/tradefederation/core/javatests/res/config",
    "tools/tradefederation/contrib/res/config",
    "vendor/google_tradefederation/core/res/config",
];

/// Resolves integration config names such as `native-benchmark` or `google/example/foo`.
#[derive(Debug)]
pub struct IntegrationFinder<'a> {
    build_top: &'a Utf8Path,
    cwd: Utf8PathBuf,
}

impl<'a> IntegrationFinder<'a> {
    pub(crate) fn new(build_top: &'a Utf8Path, cwd: Utf8PathBuf) -> Self {
        Self { build_top, cwd }
    }

    /// Finds the integration config `name`, optionally followed by `:Class#methods`.
    pub fn find_test_by_integration_name(&self, name: &str) -> FindResult {
        let (name, class_ref) = match name.split_once(':') {
            Some((name, class_ref)) => (name, Some(class_ref)),
            None => (name, None),
        };
        let filters = match class_ref {
            Some(class_ref) => {
                let (class_name, methods) = split_methods(class_ref)?;
                vec![TestFilter::new(class_name, methods)]
            }
            None => Vec::new(),
        };

        let xml_name = format!("{name}.xml");
        for dir in INTEGRATION_DIRS {
            let path = self.build_top.join(dir).join(&xml_name);
            if !path.is_file() {
                continue;
            }
            debug!("found integration config {path}");
            let rel_config = format!("{dir}/{xml_name}");
            return Ok(vec![
                TestInfo::new(name, RunnerKind::Tradefed.name(), Vec::<String>::new())
                    .with_filters(filters)
                    .with_rel_config(rel_config),
            ]);
        }
        Ok(Vec::new())
    }

    /// Finds the integration config at `path`, which must live under an integration directory.
    pub fn find_int_test_by_path(&self, path: &str) -> FindResult {
        let (path, methods) = split_methods(path)?;
        if !methods.is_empty() {
            return Ok(Vec::new());
        }
        let path = Utf8Path::new(path);
        if path.extension() != Some("xml") {
            return Ok(Vec::new());
        }
        let Ok(path) = self.cwd.join(path).canonicalize_utf8() else {
            return Ok(Vec::new());
        };
        for dir in INTEGRATION_DIRS {
            let Ok(rel_name) = path.strip_prefix(self.build_top.join(dir)) else {
                continue;
            };
            let name = rel_name.with_extension("");
            return self.find_test_by_integration_name(name.as_str());
        }
        debug!("{path} is not under an integration directory");
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maplit::btreeset;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn name_and_path() {
        let dir = camino_tempfile::tempdir().expect("created temp dir");
        let root = dir.path().canonicalize_utf8().expect("canonicalized temp dir");
        let config_dir = root.join("tools/tradefederation/contrib/res/config/google/example");
        fs::create_dir_all(&config_dir).expect("created config dir");
        fs::write(config_dir.join("foo.xml"), "<configuration />\n").expect("wrote config");

        let finder = IntegrationFinder::new(&root, root.clone());
        let infos = finder
            .find_test_by_integration_name("google/example/foo")
            .expect("no discovery error");
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].test_runner, "AtestTradefedTestRunner");
        assert!(infos[0].build_targets.is_empty());
        assert_eq!(
            infos[0].data.rel_config.as_deref(),
            Some("tools/tradefederation/contrib/res/config/google/example/foo.xml")
        );

        let infos = finder
            .find_test_by_integration_name("google/example/foo:a.b.FooTest#testA")
            .expect("no discovery error");
        assert_eq!(
            infos[0].data.filters,
            btreeset! {TestFilter::new("a.b.FooTest", ["testA"])}
        );

        let by_path = finder
            .find_int_test_by_path("tools/tradefederation/contrib/res/config/google/example/foo.xml")
            .expect("no discovery error");
        assert_eq!(by_path[0].test_name, "google/example/foo");

        assert_eq!(finder.find_test_by_integration_name("missing"), Ok(Vec::new()));
        assert_eq!(finder.find_int_test_by_path("foo.xml"), Ok(Vec::new()));
    }
}
