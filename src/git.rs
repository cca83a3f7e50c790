//! Version-control state: branch, commit, nearest tag and `git describe`.
//!
//! Two strategies, never mixed within one pass:
//!   * `Process` runs `git` four times through a [`CommandRunner`]. Each
//!     command degrades to an empty field on its own.
//!   * `Properties` reads values a CI system already exported. Nothing is
//!     spawned.

use std::time::Duration;

use serde::{Serialize, Serializer, ser::SerializeStruct};
use tracing::{debug, warn};

use crate::{
    config::{Properties, keys},
    process::{CancellationToken, CommandError, CommandRunner, CommandSpec, DEFAULT_TIMEOUT},
};

pub const GIT: &str = "git";

/// Length of an abbreviated commit id.
pub const SHORT_HASH_LEN: usize = 7;

const BRANCH_ARGS: &[&str] = &["rev-parse", "--abbrev-ref", "HEAD"];
const COMMIT_ARGS: &[&str] = &["rev-parse", "HEAD"];
const NEAREST_TAG_ARGS: &[&str] = &["describe", "--tags", "--abbrev=0"];
const DESCRIBE_ARGS: &[&str] = &["describe", "--tags"];

/// Repository state at build time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitFacts {
    pub branch: String,
    pub commit_hash: String,
    pub nearest_tag: String,
    pub detailed_description: String,
}

impl GitFacts {
    /// First seven characters of the commit id, or the whole id when shorter.
    pub fn short_commit_hash(&self) -> &str {
        match self.commit_hash.char_indices().nth(SHORT_HASH_LEN) {
            Some((end, _)) => &self.commit_hash[..end],
            None => &self.commit_hash,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
            && self.commit_hash.is_empty()
            && self.nearest_tag.is_empty()
            && self.detailed_description.is_empty()
    }
}

// The short hash is derived, so it is serialized but never stored.
impl Serialize for GitFacts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("GitFacts", 5)?;
        state.serialize_field("branch", &self.branch)?;
        state.serialize_field("commit_hash", &self.commit_hash)?;
        state.serialize_field("short_commit_hash", self.short_commit_hash())?;
        state.serialize_field("nearest_tag", &self.nearest_tag)?;
        state.serialize_field("detailed_description", &self.detailed_description)?;
        state.end()
    }
}

/// How git facts are obtained for this pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GitStrategy {
    /// Git info is off: no group is emitted.
    Disabled,
    /// Invoke the git executable.
    Process { program: String, timeout: Duration },
    /// Read pre-supplied build properties.
    Properties,
}

impl GitStrategy {
    /// `BUILDFACTS_INCLUDE_GIT_INFO` turns git facts on;
    /// `BUILDFACTS_USE_GIT_PROCESS` additionally allows spawning `git`.
    pub fn from_properties(props: &Properties) -> Self {
        if !props.resolve_bool(keys::INCLUDE_GIT_INFO, &[]) {
            return Self::Disabled;
        }
        if props.resolve_bool(keys::USE_GIT_PROCESS, &[]) {
            let default_ms = u32::try_from(DEFAULT_TIMEOUT.as_millis()).unwrap_or(u32::MAX);
            let timeout_ms = props.resolve_u32(keys::GIT_TIMEOUT_MS, &[], default_ms);
            return Self::Process {
                program: GIT.to_string(),
                timeout: Duration::from_millis(u64::from(timeout_ms)),
            };
        }
        Self::Properties
    }

    pub fn is_enabled(&self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

/// Resolve git facts with the given strategy.
///
/// `Ok(None)` means git info is disabled. The only error is cancellation;
/// every other failure leaves the affected field empty.
pub fn retrieve<R: CommandRunner + ?Sized>(
    strategy: &GitStrategy,
    props: &Properties,
    runner: &R,
    cancel: &CancellationToken,
) -> Result<Option<GitFacts>, CommandError> {
    let facts = match strategy {
        GitStrategy::Disabled => return Ok(None),
        GitStrategy::Process { program, timeout } => {
            let query = |args: &[&str]| -> Result<String, CommandError> {
                let spec = CommandSpec::new(program.as_str(), args.iter().copied()).with_timeout(*timeout);
                match runner.run(&spec, cancel) {
                    Ok(out) => Ok(out),
                    Err(err) if err.is_cancelled() => Err(err),
                    Err(err) => {
                        warn!(command = %spec.command_line(), %err, "git query failed, leaving field empty");
                        Ok(String::new())
                    }
                }
            };
            GitFacts {
                branch: query(BRANCH_ARGS)?,
                commit_hash: query(COMMIT_ARGS)?,
                nearest_tag: query(NEAREST_TAG_ARGS)?,
                detailed_description: query(DESCRIBE_ARGS)?,
            }
        }
        GitStrategy::Properties => from_properties(props),
    };

    debug!(
        branch = %facts.branch,
        commit = %facts.commit_hash,
        tag = %facts.nearest_tag,
        "resolved git facts"
    );
    Ok(Some(facts))
}

/// Property-fallback strategy. The description is not something CI systems
/// export, so it stays empty.
pub fn from_properties(props: &Properties) -> GitFacts {
    GitFacts {
        branch: props.resolve(keys::GIT_BRANCH_PRIMARY, &[keys::GIT_BRANCH], ""),
        commit_hash: props.resolve(keys::GIT_COMMIT_ID, &[keys::GIT_COMMIT], ""),
        nearest_tag: props.resolve(keys::GIT_TAG, &[], ""),
        detailed_description: String::new(),
    }
}
