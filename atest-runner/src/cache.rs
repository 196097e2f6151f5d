// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A per-test-reference cache of resolved tests.
//!
//! Each reference is stored in its own file, named after the MD5 hash of the reference, under a
//! root directory specific to the branch and lunch target. The cache is best-effort: read and
//! write failures are logged and otherwise ignored, and unreadable entries are deleted and treated
//! as a miss.

use crate::{helpers::md5_hex, test_info::TestInfo};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use etcetera::{BaseStrategy, choose_base_strategy};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fs, io};
use tracing::{debug, warn};

/// The version of the on-disk format. Entries written with a different version are discarded.
pub const CACHE_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    version: u32,
    test_ref: String,
    infos: Vec<TestInfo>,
}

/// A cache of resolved test references.
#[derive(Clone, Debug)]
pub struct TestInfoCache {
    root: Option<Utf8PathBuf>,
}

impl TestInfoCache {
    /// Creates a cache rooted at `<misc_dir>/.atest/info_cache/<hash>`, where the hash is derived
    /// from the resolution mode, the manifest branch and the build target.
    pub fn new(misc_dir: &Utf8Path, mode: &str, branch: &str, target: &str) -> Self {
        let key = md5_hex(&format!("{mode}{branch}{target}"));
        let root = misc_dir
            .join(".atest")
            .join("info_cache")
            .join(&key[..8]);
        Self { root: Some(root) }
    }

    /// A cache that never stores or returns anything.
    pub fn disabled() -> Self {
        Self { root: None }
    }

    /// Returns the default directory the cache lives under: the platform cache directory.
    pub fn default_misc_dir() -> Option<Utf8PathBuf> {
        let strategy = choose_base_strategy().ok()?;
        Utf8PathBuf::from_path_buf(strategy.cache_dir().join("atest")).ok()
    }

    /// The root directory, if the cache is enabled.
    pub fn root(&self) -> Option<&Utf8Path> {
        self.root.as_deref()
    }

    /// Returns the file that stores `test_ref`.
    pub fn cache_path(&self, test_ref: &str) -> Option<Utf8PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(format!("{}.cache", md5_hex(test_ref))))
    }

    /// Loads the tests previously resolved for `test_ref`.
    ///
    /// An unreadable entry is removed and reported as a miss.
    pub fn load(&self, test_ref: &str) -> Option<BTreeSet<TestInfo>> {
        let path = self.cache_path(test_ref)?;
        let contents = match fs::read(&path) {
            Ok(contents) => contents,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                debug!("unable to read cache {path}: {error}");
                return None;
            }
        };

        debug!("loading cache {path}");
        match serde_json::from_slice::<CacheEntry>(&contents) {
            Ok(entry) if entry.version == CACHE_VERSION && entry.test_ref == test_ref => {
                Some(entry.infos.into_iter().collect())
            }
            Ok(entry) if entry.version != CACHE_VERSION => {
                debug!(
                    "discarding cache {path} with version {} (expected {CACHE_VERSION})",
                    entry.version
                );
                remove_entry(&path);
                None
            }
            Ok(_) => {
                // The hash matched a different reference.
                None
            }
            Err(error) => {
                debug!(cache_access_failure = true, "removing corrupt cache {path}: {error}");
                remove_entry(&path);
                None
            }
        }
    }

    /// Stores the tests resolved for `test_ref`. Failures are logged and ignored.
    pub fn save(&self, test_ref: &str, infos: &BTreeSet<TestInfo>) {
        let Some(path) = self.cache_path(test_ref) else {
            return;
        };
        if let Err(error) = write_entry(&path, test_ref, infos) {
            debug!(cache_access_failure = true, "unable to save cache {path}: {error}");
        } else {
            debug!("saved cache {path}");
        }
    }

    /// Removes the entries for `test_refs`.
    pub fn clear<S: AsRef<str>>(&self, test_refs: &[S]) {
        for test_ref in test_refs {
            if let Some(path) = self.cache_path(test_ref.as_ref()) {
                if path.is_file() {
                    debug!("removing cache {path}");
                    remove_entry(&path);
                }
            }
        }
    }

    /// Removes every entry.
    pub fn clear_all(&self) {
        let Some(root) = &self.root else {
            return;
        };
        match fs::remove_dir_all(root) {
            Ok(()) => debug!("removed cache directory {root}"),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => warn!("unable to remove cache directory {root}: {error}"),
        }
    }
}

fn write_entry(path: &Utf8Path, test_ref: &str, infos: &BTreeSet<TestInfo>) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let entry = CacheEntry {
        version: CACHE_VERSION,
        test_ref: test_ref.to_owned(),
        infos: infos.iter().cloned().collect(),
    };
    AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
        .write(|file| serde_json::to_writer(file, &entry))
        .map_err(io::Error::other)
}

fn remove_entry(path: &Utf8Path) {
    if let Err(error) = fs::remove_file(path) {
        debug!("unable to remove cache {path}: {error}");
    }
}
