//! Flat build-property mapping and fallback-chain resolution.
//!
//! Properties are whatever the host hands us: the build-script environment,
//! a YAML file, or `KEY=VALUE` overrides from the CLI. Absence is normal, so
//! every lookup resolves to a default instead of failing.

use std::{collections::BTreeMap, fs, path::Path};

use snafu::ResultExt;
use tracing::trace;

use crate::error::{ParsePropertiesSnafu, ReadPropertiesSnafu, Result};

/// Recognised property names.
pub mod keys {
    pub const TARGET: &str = "TARGET";
    pub const TARGET_ARCH: &str = "CARGO_CFG_TARGET_ARCH";
    pub const CONFIGURATION: &str = "BUILDFACTS_CONFIGURATION";
    pub const PROFILE: &str = "PROFILE";
    pub const OPT_LEVEL: &str = "OPT_LEVEL";
    pub const WARNING_LEVEL: &str = "BUILDFACTS_WARNING_LEVEL";
    pub const ENCODED_RUSTFLAGS: &str = "CARGO_ENCODED_RUSTFLAGS";
    pub const NULLABLE: &str = "BUILDFACTS_NULLABLE";
    pub const DETERMINISTIC: &str = "BUILDFACTS_DETERMINISTIC";
    pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";
    pub const LANGUAGE_VERSION: &str = "BUILDFACTS_LANGUAGE_VERSION";
    pub const PKG_RUST_VERSION: &str = "CARGO_PKG_RUST_VERSION";
    pub const COMPILER_VERSION: &str = "BUILDFACTS_COMPILER_VERSION";
    pub const RUSTC_VERSION: &str = "RUSTC_VERSION";
    pub const SDK_VERSION: &str = "BUILDFACTS_SDK_VERSION";
    pub const CARGO_VERSION: &str = "CARGO_VERSION";
    pub const PROBE_TOOLCHAIN: &str = "BUILDFACTS_PROBE_TOOLCHAIN";
    pub const RUSTC: &str = "RUSTC";
    pub const CARGO: &str = "CARGO";

    pub const INCLUDE_GIT_INFO: &str = "BUILDFACTS_INCLUDE_GIT_INFO";
    pub const USE_GIT_PROCESS: &str = "BUILDFACTS_USE_GIT_PROCESS";
    pub const GIT_TIMEOUT_MS: &str = "BUILDFACTS_GIT_TIMEOUT_MS";
    pub const GIT_COMMIT_ID: &str = "BUILDFACTS_GIT_COMMIT_ID";
    pub const GIT_COMMIT: &str = "GIT_COMMIT";
    pub const GIT_BRANCH_PRIMARY: &str = "BUILDFACTS_GIT_BRANCH";
    pub const GIT_BRANCH: &str = "GIT_BRANCH";
    pub const GIT_TAG: &str = "BUILDFACTS_GIT_TAG";

    pub const USE_ROOT_NAMESPACE: &str = "BUILDFACTS_USE_ROOT_NAMESPACE";
    pub const ROOT_NAMESPACE: &str = "BUILDFACTS_ROOT_NAMESPACE";
    pub const PKG_NAME: &str = "CARGO_PKG_NAME";
    pub const ALLOW_PROJECT_DIRECTORY: &str = "BUILDFACTS_ALLOW_PROJECT_DIRECTORY_OUTPUT";
    pub const MANIFEST_DIR: &str = "CARGO_MANIFEST_DIR";
    pub const ANALYSIS_LEVEL: &str = "BUILDFACTS_ANALYSIS_LEVEL";
    pub const ANALYSIS_LEVEL_STYLE: &str = "BUILDFACTS_ANALYSIS_LEVEL_STYLE";

    pub const PKG_VERSION: &str = "CARGO_PKG_VERSION";
    pub const FILE_VERSION: &str = "BUILDFACTS_FILE_VERSION";
    pub const COPYRIGHT: &str = "BUILDFACTS_COPYRIGHT";
    pub const COMPANY: &str = "BUILDFACTS_COMPANY";

    /// Where cargo wants generated files. Not a fact input.
    pub const OUT_DIR: &str = "OUT_DIR";

    /// Every key the pipeline may read, in table order. Build scripts use
    /// this to emit `cargo:rerun-if-env-changed` lines.
    pub const ALL: &[&str] = &[
        TARGET,
        TARGET_ARCH,
        CONFIGURATION,
        PROFILE,
        OPT_LEVEL,
        WARNING_LEVEL,
        ENCODED_RUSTFLAGS,
        NULLABLE,
        DETERMINISTIC,
        SOURCE_DATE_EPOCH,
        LANGUAGE_VERSION,
        PKG_RUST_VERSION,
        COMPILER_VERSION,
        RUSTC_VERSION,
        SDK_VERSION,
        CARGO_VERSION,
        PROBE_TOOLCHAIN,
        RUSTC,
        CARGO,
        INCLUDE_GIT_INFO,
        USE_GIT_PROCESS,
        GIT_TIMEOUT_MS,
        GIT_COMMIT_ID,
        GIT_COMMIT,
        GIT_BRANCH_PRIMARY,
        GIT_BRANCH,
        GIT_TAG,
        USE_ROOT_NAMESPACE,
        ROOT_NAMESPACE,
        PKG_NAME,
        ALLOW_PROJECT_DIRECTORY,
        MANIFEST_DIR,
        ANALYSIS_LEVEL,
        ANALYSIS_LEVEL_STYLE,
        PKG_VERSION,
        FILE_VERSION,
        COPYRIGHT,
        COMPANY,
    ];
}

/// A flat, string-keyed property mapping scoped to one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot the current process environment. Non-UTF-8 entries are
    /// skipped.
    pub fn from_env() -> Self {
        std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }

    /// Load a flat YAML mapping. Scalar values are stringified so that
    /// `BUILDFACTS_INCLUDE_GIT_INFO: true` works without quoting.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).context(ReadPropertiesSnafu { path })?;
        Self::from_yaml_str(&text).context(ParsePropertiesSnafu { path })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let raw: BTreeMap<String, serde_yml::Value> = serde_yml::from_str(text)?;
        Ok(raw
            .into_iter()
            .filter_map(|(k, v)| scalar_to_string(&v).map(|s| (k, s)))
            .collect())
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Later values win.
    pub fn extend(&mut self, other: Properties) {
        self.values.extend(other.values);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Look up `primary`, then each of `fallbacks` in order.
    pub fn lookup(&self, primary: &str, fallbacks: &[&str]) -> Option<&str> {
        std::iter::once(primary)
            .chain(fallbacks.iter().copied())
            .find_map(|key| self.get(key))
    }

    /// Resolve a string option, falling back to `default` when no key in the
    /// chain is present.
    pub fn resolve(&self, primary: &str, fallbacks: &[&str], default: &str) -> String {
        match self.lookup(primary, fallbacks) {
            Some(value) => value.to_string(),
            None => {
                trace!(key = primary, ?fallbacks, default, "property not set, using default");
                default.to_string()
            }
        }
    }

    /// Resolve a flag. Only `true`, in any casing, is true.
    pub fn resolve_bool(&self, primary: &str, fallbacks: &[&str]) -> bool {
        self.lookup(primary, fallbacks).is_some_and(parse_bool)
    }

    /// Resolve a non-negative integer; unset or unparseable values yield
    /// `default`.
    pub fn resolve_u32(&self, primary: &str, fallbacks: &[&str], default: u32) -> u32 {
        match self.lookup(primary, fallbacks).map(|v| v.trim().parse::<u32>()) {
            Some(Ok(value)) => value,
            Some(Err(err)) => {
                trace!(key = primary, %err, default, "property is not an integer, using default");
                default
            }
            None => default,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Properties {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Case-insensitive match against the literal `true`.
pub fn parse_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

/// Parse a `KEY=VALUE` override as given on the command line.
pub fn parse_assignment(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn scalar_to_string(value: &serde_yml::Value) -> Option<String> {
    match value {
        serde_yml::Value::String(s) => Some(s.clone()),
        serde_yml::Value::Bool(b) => Some(b.to_string()),
        serde_yml::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
