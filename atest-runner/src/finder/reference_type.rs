// Copyright (c) The atest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Classifying test references by shape.
//!
//! The shape of a reference (does it look like a path, a qualified class, `module:class`...)
//! decides which find methods are tried for it, and in which order.

use crate::test_identifier::TestIdentifier;
use regex::Regex;
use std::{collections::BTreeSet, fmt, sync::LazyLock};

static MODULE_REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<module>[^:#]+):(?P<pkg_class>[^#]+)#?(?P<methods>.*)$")
        .expect("module reference regex is valid")
});
static METHOD_WITH_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]+\[").expect("method bracket regex is valid"));

/// A way of resolving a test reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FinderMethod {
    /// A module name.
    Module,
    /// A module name decorated with mainline binaries.
    MainlineModule,
    /// A class name, searched for across the tree.
    Class,
    /// `module:class`.
    ModuleClass,
    /// A fully qualified class name.
    QualifiedClass,
    /// A Java package.
    Package,
    /// `module:package`.
    ModulePackage,
    /// A path to a file or directory belonging to a module.
    ModuleFilePath,
    /// A path to a Tradefed integration config.
    IntegrationFilePath,
    /// The name of a Tradefed integration config.
    Integration,
    /// A gtest class name.
    CcClass,
    /// The name of a compatibility suite plan.
    SuitePlan,
    /// A path to a suite plan config.
    SuitePlanFilePath,
    /// A previously resolved reference.
    Cache,
    /// The stem of a test config listed in module-info.
    Config,
}

impl FinderMethod {
    /// The name printed when this method resolves a test.
    pub fn name(self) -> &'static str {
        match self {
            Self::Module => "MODULE",
            Self::MainlineModule => "MAINLINE_MODULE",
            Self::Class => "CLASS",
            Self::ModuleClass => "MODULE_CLASS",
            Self::QualifiedClass => "QUALIFIED_CLASS",
            Self::Package => "PACKAGE",
            Self::ModulePackage => "MODULE_PACKAGE",
            Self::ModuleFilePath => "MODULE_FILE_PATH",
            Self::IntegrationFilePath => "INTEGRATION_FILE_PATH",
            Self::Integration => "INTEGRATION",
            Self::CcClass => "CC_CLASS",
            Self::SuitePlan => "SUITE_PLAN",
            Self::SuitePlanFilePath => "SUITE_PLAN_FILE_PATH",
            Self::Cache => "CACHE",
            Self::Config => "CONFIG",
        }
    }
}

impl fmt::Display for FinderMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returns the find methods to try for `test_ref`, in priority order.
pub fn reference_types(test_ref: &str) -> Vec<FinderMethod> {
    use FinderMethod::*;

    if test_ref.starts_with('.') || test_ref.contains("..") {
        return vec![Cache, ModuleFilePath, IntegrationFilePath, SuitePlanFilePath];
    }
    if test_ref.contains('/') {
        if test_ref.starts_with('/') {
            return vec![Cache, ModuleFilePath, IntegrationFilePath, SuitePlanFilePath];
        }
        if test_ref.contains(':') {
            return vec![
                Cache,
                ModuleFilePath,
                IntegrationFilePath,
                Integration,
                SuitePlanFilePath,
                ModuleClass,
            ];
        }
        return vec![
            Cache,
            ModuleFilePath,
            IntegrationFilePath,
            Integration,
            SuitePlanFilePath,
            CcClass,
        ];
    }
    if TestIdentifier::parse(test_ref).is_mainline() {
        return vec![Cache, MainlineModule];
    }

    let ref_end = test_ref.rsplit_once('.').map(|(_, end)| end);
    if ModuleReference::parse(test_ref).is_some() {
        return match ref_end {
            Some(end) if end.starts_with(|c: char| c.is_uppercase()) => {
                vec![Cache, ModuleClass, Integration]
            }
            Some(_) => vec![Cache, ModulePackage, ModuleClass],
            None => vec![Cache, ModuleClass, Integration],
        };
    }
    if let Some(ref_end) = ref_end {
        let ext = ref_end.split('#').next().unwrap_or_default();
        return match ext {
            "java" | "kt" | "bp" | "mk" | "cc" | "cpp" => vec![Cache, ModuleFilePath],
            "xml" => vec![Cache, IntegrationFilePath, SuitePlanFilePath],
            _ => vec![Cache, Module, QualifiedClass, Package],
        };
    }

    vec![Cache, Module, Integration, Config, SuitePlan, Class, CcClass]
}

/// A reference of the form `module:package_or_class[#methods]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleReference<'a> {
    /// The module, or the integration name.
    pub module: &'a str,
    /// The package or class.
    pub pkg_class: &'a str,
    /// The methods as written, possibly empty.
    pub methods: &'a str,
}

impl<'a> ModuleReference<'a> {
    /// Parses `test_ref`, returning `None` if it isn't of the `module:...` form.
    pub fn parse(test_ref: &'a str) -> Option<Self> {
        let captures = MODULE_REFERENCE_RE.captures(test_ref)?;
        Some(Self {
            module: captures.name("module")?.as_str(),
            pkg_class: captures.name("pkg_class")?.as_str(),
            methods: captures.name("methods").map_or("", |m| m.as_str()),
        })
    }
}

/// Splits a reference into the test part and the set of methods after `#`.
///
/// Methods are comma-separated, but a comma inside brackets belongs to a parameterized method
/// name, e.g. `testFoo[a,b]`.
pub fn split_methods(user_input: &str) -> Result<(&str, BTreeSet<String>), String> {
    let too_many = |c: char| {
        format!(
            "Too many \"{c}\" characters in user input:\n\t{user_input}\n\
             Multiple classes should be separated by space, and methods belong to the same class \
             should be separated by comma. Example syntaxes are:\n\
             \tclass1 class2#method1 class3#method2,method3\n\
             \tclass1#method class2#method"
        )
    };

    let Some((test, methods)) = user_input.split_once('#') else {
        if user_input.contains(',') {
            return Err(too_many(','));
        }
        return Ok((user_input, BTreeSet::new()));
    };
    if methods.contains('#') {
        return Err(too_many('#'));
    }

    let mut parsed: Vec<String> = Vec::new();
    for part in methods.split(',') {
        let balanced = part.matches('[').count() == part.matches(']').count();
        if balanced || METHOD_WITH_BRACKET_RE.is_match(part) {
            parsed.push(part.to_owned());
        } else if let Some(last) = parsed.last_mut() {
            last.push(',');
            last.push_str(part);
        } else {
            parsed.push(part.to_owned());
        }
    }
    Ok((test, parsed.into_iter().collect()))
}
