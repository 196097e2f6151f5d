// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A background index of test sources in the tree.
//!
//! Walking the whole tree for every class reference is slow, so a worker thread builds an index
//! of Java classes, packages and gtest classes and writes it to disk. Finders use the index if
//! it has been written, and walk the tree themselves otherwise. Nothing ever waits on the worker.

use super::{
    cc_filter::{CC_CLASS_METHOD_RE, get_cc_class_info},
    java_filter::{is_cc_file, is_java_file, package_from_source},
};
use atomicwrites::{AtomicFile, OverwriteBehavior};
use camino::{Utf8Path, Utf8PathBuf};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    cell::OnceCell,
    collections::{BTreeMap, BTreeSet},
    fs, io,
    sync::LazyLock,
    thread::{self, JoinHandle},
    time::Instant,
};
use tracing::debug;
use walkdir::WalkDir;

/// The name of the index file within the index directory.
pub const INDEX_FILE_NAME: &str = "source-index.json";

const SKIPPED_DIRS: &[&str] = &["out", ".git", ".repo"];

static JAVA_METHOD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r".*\s+(fun|void)\s+(?P<method>\w+)\(").expect("java method regex is valid")
});
static JAVA_PARAM_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\S+\]").expect("parameter suffix regex is valid"));
static CC_TEST_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)test.*\.(cc|cpp)$").expect("cc test file regex is valid"));

/// The contents of the index. Paths are relative to the root of the tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexData {
    /// Java and Kotlin class names to the files defining them.
    pub classes: BTreeMap<String, BTreeSet<String>>,
    /// Fully qualified class names to the files defining them.
    pub qualified_classes: BTreeMap<String, BTreeSet<String>>,
    /// Packages to the directories holding their sources.
    pub packages: BTreeMap<String, BTreeSet<String>>,
    /// gtest class names to the files defining them.
    pub cc_classes: BTreeMap<String, BTreeSet<String>>,
}

/// The on-disk source index for a tree.
#[derive(Clone, Debug)]
pub struct SourceIndex {
    root: Utf8PathBuf,
    index_path: Utf8PathBuf,
}

impl SourceIndex {
    /// Creates an index of `root`, stored in `index_dir`.
    pub fn new(root: impl Into<Utf8PathBuf>, index_dir: &Utf8Path) -> Self {
        Self {
            root: root.into(),
            index_path: index_dir.join(INDEX_FILE_NAME),
        }
    }

    /// The file the index is stored in.
    pub fn index_path(&self) -> &Utf8Path {
        &self.index_path
    }

    /// Starts building the index on a worker thread.
    ///
    /// The returned handle may be dropped: the index is only used once it's been written.
    pub fn spawn(&self) -> io::Result<JoinHandle<()>> {
        let index = self.clone();
        thread::Builder::new()
            .name("atest-source-index".to_owned())
            .spawn(move || {
                let start = Instant::now();
                let data = index.build();
                match index.write(&data) {
                    Ok(()) => debug!(
                        "wrote source index {} in {:?}",
                        index.index_path,
                        start.elapsed()
                    ),
                    Err(error) => debug!(
                        cache_access_failure = true,
                        "unable to write source index {}: {error}", index.index_path
                    ),
                }
            })
    }

    /// Walks the tree and builds the index.
    pub fn build(&self) -> IndexData {
        let mut data = IndexData::default();
        for path in walk_source_files(&self.root) {
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            if is_java_file(&path) {
                let Some(stem) = path.file_stem() else {
                    continue;
                };
                data.classes
                    .entry(stem.to_owned())
                    .or_default()
                    .insert(rel.to_string());
                let Ok(contents) = fs::read_to_string(&path) else {
                    continue;
                };
                if let Some(package) = package_from_source(&contents) {
                    data.qualified_classes
                        .entry(format!("{package}.{stem}"))
                        .or_default()
                        .insert(rel.to_string());
                    if let Some(dir) = rel.parent() {
                        data.packages
                            .entry(package.to_owned())
                            .or_default()
                            .insert(dir.to_string());
                    }
                }
            } else if is_cc_test_file(&path) {
                let Ok(contents) = fs::read_to_string(&path) else {
                    continue;
                };
                for class in get_cc_class_info(&contents).into_keys() {
                    data.cc_classes
                        .entry(class)
                        .or_default()
                        .insert(rel.to_string());
                }
            }
        }
        data
    }

    /// Writes `data` to the index file.
    pub fn write(&self, data: &IndexData) -> io::Result<()> {
        if let Some(parent) = self.index_path.parent() {
            fs::create_dir_all(parent)?;
        }
        AtomicFile::new(&self.index_path, OverwriteBehavior::AllowOverwrite)
            .write(|file| serde_json::to_writer(file, data))
            .map_err(io::Error::other)
    }

    /// Reads the index, if it has been written. A corrupt index is removed.
    pub fn load(&self) -> Option<IndexData> {
        let contents = fs::read(&self.index_path).ok()?;
        match serde_json::from_slice(&contents) {
            Ok(data) => Some(data),
            Err(error) => {
                debug!(
                    cache_access_failure = true,
                    "removing corrupt source index {}: {error}", self.index_path
                );
                let _ = fs::remove_file(&self.index_path);
                None
            }
        }
    }
}

fn is_cc_test_file(path: &Utf8Path) -> bool {
    is_cc_file(path) && CC_TEST_FILE_RE.is_match(path.as_str())
}

/// Iterates over every file under `search_root`, skipping output and VCS directories.
pub(crate) fn walk_source_files(search_root: &Utf8Path) -> impl Iterator<Item = Utf8PathBuf> {
    WalkDir::new(search_root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            !(entry.depth() > 0
                && entry.file_type().is_dir()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| SKIPPED_DIRS.contains(&name)))
        })
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| Utf8PathBuf::from_path_buf(entry.into_path()).ok())
}

/// Source lookups for finders, backed by the index when available.
#[derive(Debug)]
pub(crate) struct SourceSearch<'a> {
    build_top: &'a Utf8Path,
    index: Option<&'a SourceIndex>,
    loaded: OnceCell<IndexData>,
}

impl<'a> SourceSearch<'a> {
    pub(crate) fn new(build_top: &'a Utf8Path, index: Option<&'a SourceIndex>) -> Self {
        Self {
            build_top,
            index,
            loaded: OnceCell::new(),
        }
    }

    fn index_data(&self) -> Option<&IndexData> {
        if let Some(data) = self.loaded.get() {
            return Some(data);
        }
        let data = self.index?.load()?;
        Some(self.loaded.get_or_init(|| data))
    }

    /// Finds the files defining `class_name` under `search_dir`.
    ///
    /// `class_name` may be a plain name, a qualified name or (with `native`) a gtest class. If
    /// `methods` is non-empty, only files that define every method are returned.
    pub(crate) fn find_class_files(
        &self,
        search_dir: &Utf8Path,
        class_name: &str,
        native: bool,
        methods: &BTreeSet<String>,
    ) -> Vec<Utf8PathBuf> {
        if !search_dir.is_dir() {
            debug!("'{search_dir}' does not exist");
            return Vec::new();
        }

        let candidates: BTreeSet<Utf8PathBuf> = match self.index_data() {
            Some(data) => {
                let table = if native {
                    &data.cc_classes
                } else if class_name.contains('.') {
                    &data.qualified_classes
                } else {
                    &data.classes
                };
                self.indexed_paths(table.get(class_name), search_dir)
            }
            None => self.walk_for_class(search_dir, class_name, native),
        };

        candidates
            .into_iter()
            .filter(|path| methods.is_empty() || has_methods_in_file(path, methods))
            .collect()
    }

    /// Finds directories under `search_dir` holding sources of `package`.
    pub(crate) fn find_package_dirs(
        &self,
        search_dir: &Utf8Path,
        package: &str,
    ) -> Vec<Utf8PathBuf> {
        if !search_dir.is_dir() {
            return Vec::new();
        }
        if let Some(data) = self.index_data() {
            return self
                .indexed_paths(data.packages.get(package), search_dir)
                .into_iter()
                .collect();
        }

        let suffix = package.replace('.', "/");
        let dirs: BTreeSet<Utf8PathBuf> = walk_source_files(search_dir)
            .filter(|path| is_java_file(path))
            .filter_map(|path| path.parent().map(Utf8Path::to_owned))
            .filter(|dir| dir.as_str().ends_with(&format!("/{suffix}")))
            .collect();
        dirs.into_iter().collect()
    }

    fn indexed_paths(
        &self,
        rel_paths: Option<&BTreeSet<String>>,
        search_dir: &Utf8Path,
    ) -> BTreeSet<Utf8PathBuf> {
        rel_paths
            .into_iter()
            .flatten()
            .map(|rel| self.build_top.join(rel))
            .filter(|path| path.starts_with(search_dir))
            .collect()
    }

    fn walk_for_class(
        &self,
        search_dir: &Utf8Path,
        class_name: &str,
        native: bool,
    ) -> BTreeSet<Utf8PathBuf> {
        if native {
            return walk_source_files(search_dir)
                .filter(|path| is_cc_test_file(path))
                .filter(|path| {
                    fs::read_to_string(path).is_ok_and(|contents| {
                        CC_CLASS_METHOD_RE
                            .captures_iter(&contents)
                            .any(|c| &c["class_name"] == class_name)
                    })
                })
                .collect();
        }

        let suffix = class_name.replace('.', "/");
        walk_source_files(search_dir)
            .filter(|path| is_java_file(path))
            .filter(|path| {
                let without_ext = path.with_extension("");
                if class_name.contains('.') {
                    without_ext.as_str().ends_with(&format!("/{suffix}"))
                } else {
                    path.file_stem() == Some(class_name)
                }
            })
            .collect()
    }
}

/// Returns true if every method in `methods` is defined in the file at `path`.
pub(crate) fn has_methods_in_file(path: &Utf8Path, methods: &BTreeSet<String>) -> bool {
    let Ok(contents) = fs::read_to_string(path) else {
        return false;
    };
    if is_java_file(path) {
        let defined: BTreeSet<&str> = contents
            .lines()
            .filter_map(|line| JAVA_METHOD_RE.captures(line))
            .filter_map(|c| c.name("method").map(|m| m.as_str()))
            .collect();
        return methods
            .iter()
            .all(|m| defined.contains(JAVA_PARAM_SUFFIX_RE.replace_all(m, "").as_ref()));
    }
    if is_cc_file(path) {
        let class_info = get_cc_class_info(&contents);
        let defined: BTreeSet<&str> = class_info
            .values()
            .flat_map(|info| info.methods.iter().map(String::as_str))
            .collect();
        return methods
            .iter()
            .all(|m| defined.contains(m.split('/').next().unwrap_or(m)));
    }
    false
}
