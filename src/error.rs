/*
 * Structured Error Definitions.
 *
 * Fact resolution never fails: missing configuration, attributes and git
 * state all degrade to defaults. The variants below are the few conditions
 * that do cross the public API: a cancelled pass, and I/O at the edges
 * (properties files in, generated units out).
 */

#![allow(unused_assignments)]

use std::path::PathBuf;

use miette::Diagnostic;
use snafu::prelude::*;

#[derive(Debug, Snafu, Diagnostic)]
#[snafu(visibility(pub))]
pub enum Error {
    /// The host cancelled the pass while a subprocess was outstanding.
    #[snafu(display("fact generation was cancelled"))]
    #[diagnostic(
        code(buildfacts::cancelled),
        help("No partial output was written; re-run the build to regenerate.")
    )]
    Cancelled,

    /// `OUT_DIR` is only set by cargo for build scripts.
    #[snafu(display("OUT_DIR is not set"))]
    #[diagnostic(
        code(buildfacts::missing_out_dir),
        help("Call this from a cargo build script, or pass an explicit output directory.")
    )]
    MissingOutDir,

    /// A generated unit could not be written.
    #[snafu(display("failed to write generated unit {}", path.display()))]
    #[diagnostic(code(buildfacts::write_unit))]
    WriteUnit {
        /// Destination of the unit.
        path: PathBuf,
        source: std::io::Error,
    },

    /// A properties file could not be read.
    #[snafu(display("failed to read properties from {}", path.display()))]
    #[diagnostic(code(buildfacts::read_properties))]
    ReadProperties {
        /// The path to the file.
        path: PathBuf,
        source: std::io::Error,
    },

    /// A properties file is not a flat YAML mapping of strings.
    #[snafu(display("failed to parse properties in {}", path.display()))]
    #[diagnostic(
        code(buildfacts::parse_properties),
        help("Properties files are flat YAML mappings, e.g. `BUILDFACTS_INCLUDE_GIT_INFO: \"true\"`.")
    )]
    ParseProperties {
        /// The path to the file.
        path: PathBuf,
        source: serde_yml::Error,
    },

    /// The built-in unit template failed to render.
    #[snafu(display("failed to render the {unit} unit"))]
    #[diagnostic(code(buildfacts::template))]
    Template {
        /// Name of the unit being rendered.
        unit: String,
        source: minijinja::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
