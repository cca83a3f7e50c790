//! Build-time facts as a generated Rust module.
//!
//! A build script calls [`generate_for_build_script`] and includes the result:
//!
//! ```ignore
//! // build.rs
//! fn main() {
//!     buildfacts::generate_for_build_script().expect("generate build facts");
//! }
//!
//! // src/main.rs
//! include!(concat!(env!("OUT_DIR"), "/build_information.rs"));
//!
//! fn main() {
//!     println!("built at {}", BuildInformation::BuildAt);
//! }
//! ```
//!
//! The pipeline is: properties → [`config`] / [`context`] / [`attributes`] /
//! [`git`] → [`facts::aggregate`] → [`emit::CodeEmitter`]. Every resolution
//! step degrades to a default; the only failure inside the pipeline is host
//! cancellation.

pub mod attributes;
pub mod config;
pub mod context;
pub mod emit;
pub mod error;
pub mod facts;
pub mod git;
pub mod process;
pub mod sink;

use tracing::debug;

pub use attributes::{AssemblyAttribute, AttributeSource, AttributeValue, PackageAttributes};
pub use config::{Properties, keys};
pub use context::CompilationContext;
pub use emit::{CodeEmitter, GeneratedSource};
pub use error::{Error, Result};
pub use facts::{Clock, Facts, FixedClock, SystemClock};
pub use git::{GitFacts, GitStrategy};
pub use process::{CancellationToken, CommandRunner, CommandSpec, SystemCommandRunner};
pub use sink::generate_for_build_script;

/// Everything one generation pass reads. All of it is scoped to the pass, so
/// independent passes can run in parallel.
pub struct GenerationInput<'a> {
    pub context: CompilationContext,
    pub properties: &'a Properties,
    pub attributes: &'a dyn AttributeSource,
    pub clock: &'a dyn Clock,
    pub runner: &'a dyn CommandRunner,
    pub cancel: &'a CancellationToken,
}

/// Result of one pass: the facts and the text rendered from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSources {
    pub facts: Facts,
    pub git: Option<GitFacts>,
    /// `BuildInformation`, then `GitInformation` when enabled.
    pub units: Vec<GeneratedSource>,
    /// Both groups in one unit under a single namespace.
    pub combined: String,
}

impl GeneratedSources {
    pub fn unit(&self, name: &str) -> Option<&GeneratedSource> {
        self.units.iter().find(|unit| unit.name == name)
    }
}

/// Run one generation pass.
///
/// Either every unit is rendered or, if `cancel` fires, none is.
pub fn generate(input: &GenerationInput<'_>) -> Result<GeneratedSources> {
    let props = input.properties;
    ensure_not_cancelled(input.cancel)?;

    let mut compilation = input.context.clone();
    if props.resolve_bool(keys::PROBE_TOOLCHAIN, &[]) {
        // Probes only fail on cancellation.
        compilation
            .probe_toolchain(props, input.runner, input.cancel)
            .map_err(|_| Error::Cancelled)?;
    }

    let metadata = context::extract(&compilation, props);
    let assembly = attributes::AssemblyInfo::read(input.attributes);

    let strategy = GitStrategy::from_properties(props);
    debug!(?strategy, "git strategy");
    let git_facts =
        git::retrieve(&strategy, props, input.runner, input.cancel).map_err(|_| Error::Cancelled)?;

    let facts = facts::aggregate(input.clock, metadata, assembly, props);

    let emitter = CodeEmitter::new();
    let units = emitter.units(&facts, git_facts.as_ref())?;
    let combined = emitter.render(&facts, git_facts.as_ref())?;

    ensure_not_cancelled(input.cancel)?;
    Ok(GeneratedSources {
        facts,
        git: git_facts,
        units,
        combined,
    })
}

fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return error::CancelledSnafu.fail();
    }
    Ok(())
}

#[cfg(test)]
mod common;
