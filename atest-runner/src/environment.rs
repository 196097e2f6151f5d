// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Android build environment set up by `lunch`.

use crate::errors::EnvironmentError;
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use std::{fs, sync::LazyLock};
use tracing::debug;

/// The root of the source tree.
pub const ANDROID_BUILD_TOP: &str = "ANDROID_BUILD_TOP";
/// The product output directory.
pub const ANDROID_PRODUCT_OUT: &str = "ANDROID_PRODUCT_OUT";
/// The host output directory.
pub const ANDROID_HOST_OUT: &str = "ANDROID_HOST_OUT";
/// The build output directory, if moved out of the tree.
pub const OUT_DIR: &str = "OUT";
/// The target testcases directory.
pub const ANDROID_TARGET_OUT_TESTCASES: &str = "ANDROID_TARGET_OUT_TESTCASES";
/// The lunch product.
pub const TARGET_PRODUCT: &str = "TARGET_PRODUCT";
/// The lunch build variant.
pub const TARGET_BUILD_VARIANT: &str = "TARGET_BUILD_VARIANT";

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<include\s+name="(?P<name>[^"]+)""#).expect("include regex is valid")
});
static REVISION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<default\b[^>]*\brevision="(?P<revision>[^"]+)""#)
        .expect("revision regex is valid")
});

/// The Android build environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AndroidEnvironment {
    build_top: Utf8PathBuf,
    product_out: Utf8PathBuf,
    host_out: Option<Utf8PathBuf>,
    out_dir: Utf8PathBuf,
    target_testcases: Option<Utf8PathBuf>,
    target_product: Option<String>,
    target_build_variant: Option<String>,
}

impl AndroidEnvironment {
    /// Reads the environment from the process environment.
    pub fn from_env() -> Result<Self, EnvironmentError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Reads the environment through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EnvironmentError> {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|value| !value.is_empty())
                .map(Utf8PathBuf::from)
                .ok_or(EnvironmentError::NotSetUp { var })
        };
        let build_top = required(ANDROID_BUILD_TOP)?;
        let product_out = required(ANDROID_PRODUCT_OUT)?;
        let out_dir = match lookup(OUT_DIR).filter(|v| !v.is_empty()) {
            Some(out) => Utf8PathBuf::from(out),
            None => build_top.join("out"),
        };

        Ok(Self {
            host_out: lookup(ANDROID_HOST_OUT).map(Utf8PathBuf::from),
            target_testcases: lookup(ANDROID_TARGET_OUT_TESTCASES).map(Utf8PathBuf::from),
            target_product: lookup(TARGET_PRODUCT),
            target_build_variant: lookup(TARGET_BUILD_VARIANT),
            build_top,
            product_out,
            out_dir,
        })
    }

    /// The root of the source tree.
    pub fn build_top(&self) -> &Utf8Path {
        &self.build_top
    }

    /// The product output directory.
    pub fn product_out(&self) -> &Utf8Path {
        &self.product_out
    }

    /// The host output directory.
    pub fn host_out(&self) -> Option<&Utf8Path> {
        self.host_out.as_deref()
    }

    /// The build output directory.
    pub fn out_dir(&self) -> &Utf8Path {
        &self.out_dir
    }

    /// The directory target testcases are installed into.
    pub fn target_testcases(&self) -> Utf8PathBuf {
        self.target_testcases
            .clone()
            .unwrap_or_else(|| self.product_out.join("testcases"))
    }

    /// The host testcases directory.
    pub fn host_testcases(&self) -> Option<Utf8PathBuf> {
        self.host_out.as_ref().map(|out| out.join("testcases"))
    }

    /// The path to `module-info.json`.
    pub fn module_info_path(&self) -> Utf8PathBuf {
        self.product_out.join("module-info.json")
    }

    /// The build target, `<product>-<variant>`.
    pub fn build_target(&self) -> String {
        format!(
            "{}-{}",
            self.target_product.as_deref().unwrap_or_default(),
            self.target_build_variant.as_deref().unwrap_or_default(),
        )
    }

    /// The manifest branch of the checkout, or the product name if it can't be read.
    pub fn manifest_branch(&self) -> String {
        read_manifest_branch(&self.build_top)
            .or_else(|| self.target_product.clone())
            .unwrap_or_default()
    }

    /// Checks that `cwd` is within the build top, and returns it relative to the build top.
    pub fn rel_cwd(&self, cwd: &Utf8Path) -> Result<Utf8PathBuf, EnvironmentError> {
        cwd.strip_prefix(&self.build_top)
            .map(|p| p.to_owned())
            .map_err(|_| EnvironmentError::OutsideRoot {
                cwd: cwd.to_owned(),
                build_top: self.build_top.clone(),
            })
    }

    /// Returns the current directory.
    pub fn current_dir() -> Result<Utf8PathBuf, EnvironmentError> {
        let cwd = std::env::current_dir().map_err(EnvironmentError::CurrentDir)?;
        Utf8PathBuf::from_path_buf(cwd).map_err(|path| EnvironmentError::CurrentDirNotUtf8 { path })
    }
}

/// Reads the default revision from the repo manifest, following a single `<include>`.
fn read_manifest_branch(build_top: &Utf8Path) -> Option<String> {
    let repo_dir = build_top.join(".repo");
    let portal = fs::read_to_string(repo_dir.join("manifest.xml")).ok();
    let manifest = match portal
        .as_deref()
        .and_then(|contents| INCLUDE_RE.captures(contents))
    {
        Some(captures) => repo_dir.join("manifests").join(&captures["name"]),
        None => repo_dir.join("manifests").join("default.xml"),
    };

    if let Some(revision) = portal
        .as_deref()
        .and_then(|contents| REVISION_RE.captures(contents))
    {
        return Some(revision["revision"].to_owned());
    }
    let contents = fs::read_to_string(&manifest)
        .inspect_err(|error| debug!("unable to read manifest {manifest}: {error}"))
        .ok()?;
    REVISION_RE
        .captures(&contents)
        .map(|captures| captures["revision"].to_owned())
}
