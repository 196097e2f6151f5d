// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration support for atest.
//!
//! The configuration is made of the defaults embedded in this crate, with an optional user config
//! file layered on top.

use crate::{
    errors::{ConfigParseError, ConfigParseErrorKind},
    levenshtein::EditCosts,
};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, File, FileFormat, builder::DefaultState};
use etcetera::{BaseStrategy, base_strategy::Xdg};
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Overall configuration for atest.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AtestConfig {
    /// Fuzzy search settings.
    pub fuzzy: FuzzyConfig,

    /// TEST_MAPPING settings.
    pub test_mapping: TestMappingConfig,

    /// Test info cache settings.
    pub cache: CacheConfig,

    /// Tradefed runner settings.
    pub tradefed: TradefedConfig,
}

/// Settings for fuzzy module-name search.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FuzzyConfig {
    /// Whether fuzzy search is attempted at all.
    pub enabled: bool,

    /// Edit distance costs.
    pub costs: EditCosts,

    /// The length window and maximum distance for candidates.
    pub ld_range: usize,

    /// The maximum number of suggestions to print.
    pub max_suggestions: usize,
}

/// Settings for TEST_MAPPING expansion.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TestMappingConfig {
    /// The groups selected when none is given.
    pub default_groups: Vec<String>,

    /// Suites that TEST_MAPPING modules are expected to belong to.
    pub suites: Vec<String>,
}

/// Settings for the per-reference test info cache.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Whether resolved references are cached.
    pub enabled: bool,

    /// The directory to store the cache in.
    #[serde(default)]
    pub dir: Option<Utf8PathBuf>,
}

/// Settings for the Tradefed runner.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TradefedConfig {
    /// The log level for Tradefed.
    pub log_level: String,

    /// Whether the device is released as soon as tests finish.
    pub early_device_release: bool,
}

impl AtestConfig {
    /// The default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// The name of the config file within the user config directory.
    pub const CONFIG_FILE_NAME: &'static str = "config.toml";

    /// Reads the configuration, layering `config_file` over the defaults.
    ///
    /// If `config_file` is `None`, the user config file is looked up in the XDG config directory.
    /// A missing user config file is not an error.
    pub fn from_sources(config_file: Option<&Utf8Path>) -> Result<Self, ConfigParseError> {
        let (config_file, required) = match config_file {
            Some(config_file) => (Some(config_file.to_owned()), true),
            None => (Self::user_config_path()?, false),
        };

        let mut builder = Self::make_default_config();
        if let Some(config_file) = &config_file {
            debug!("reading atest config from {config_file}");
            builder = builder.add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));
        }

        let error_path = config_file
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from("<default config>"));
        let (config, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&error_path, kind))?;

        if !ignored.is_empty() {
            warn!(
                "ignoring unknown configuration keys in {error_path}: {}",
                ignored.into_iter().collect::<Vec<_>>().join(", ")
            );
        }

        Ok(config)
    }

    /// Returns just the default configuration.
    pub fn default_config() -> Result<Self, ConfigParseError> {
        let (config, _) = Self::build_and_deserialize_config(&Self::make_default_config())
            .map_err(|kind| ConfigParseError::new("<default config>", kind))?;
        Ok(config)
    }

    /// Returns the user config path: `$XDG_CONFIG_HOME/atest/config.toml`.
    ///
    /// Returns `None` if the home directory can't be determined.
    pub fn user_config_path() -> Result<Option<Utf8PathBuf>, ConfigParseError> {
        let Ok(strategy) = Xdg::new() else {
            return Ok(None);
        };
        let path = strategy
            .config_dir()
            .join("atest")
            .join(Self::CONFIG_FILE_NAME);
        Utf8PathBuf::from_path_buf(path)
            .map(Some)
            .map_err(|path| {
                ConfigParseError::new(
                    "<user config>",
                    ConfigParseErrorKind::NonUtf8Path { path },
                )
            })
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    /// This returns a tuple of (config, ignored paths).
    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(Self, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: Self = serde_path_to_error::deserialize(ignored_de)
            .map_err(|error| ConfigParseErrorKind::DeserializeError(Box::new(error)))?;

        Ok((config, ignored))
    }
}
