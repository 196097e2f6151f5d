// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for atest-runner.

use camino::{Utf8Path, Utf8PathBuf};
use md5::{Digest, Md5};

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }
}

/// Returns the lowercase hex MD5 digest of `input`.
pub(crate) fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Returns true if `input` contains a glob wildcard character.
pub(crate) fn has_wildcard(input: &str) -> bool {
    input.contains(['*', '?'])
}

/// Joins `rel_path` onto `root` unless it is already absolute.
pub(crate) fn rel_path_join(root: &Utf8Path, rel_path: &Utf8Path) -> Utf8PathBuf {
    if rel_path.is_absolute() {
        rel_path.to_owned()
    } else {
        root.join(rel_path)
    }
}

/// Returns `path` relative to `root`, or `None` if it is outside `root`.
pub(crate) fn rel_to_root(root: &Utf8Path, path: &Utf8Path) -> Option<Utf8PathBuf> {
    path.strip_prefix(root).ok().map(|p| p.to_owned())
}

/// The `MODULES-IN-` build target for a module directory.
pub(crate) fn modules_in_target(rel_dir: &str) -> String {
    format!("MODULES-IN-{}", rel_dir.trim_matches('/').replace('/', "-"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_matches_reference() {
        assert_eq!(md5_hex(""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(md5_hex("abc"), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn modules_in() {
        assert_eq!(
            modules_in_target("platform_testing/tests/example/native"),
            "MODULES-IN-platform_testing-tests-example-native"
        );
        assert_eq!(modules_in_target("a/b/"), "MODULES-IN-a-b");
    }

    #[test]
    fn rel_paths() {
        let root = Utf8Path::new("/src");
        assert_eq!(
            rel_to_root(root, Utf8Path::new("/src/a/b")),
            Some(Utf8PathBuf::from("a/b"))
        );
        assert_eq!(rel_to_root(root, Utf8Path::new("/other")), None);
        assert_eq!(
            rel_path_join(root, Utf8Path::new("a")),
            Utf8PathBuf::from("/src/a")
        );
    }
}
