//! Compilation/session facts exposed by the build context.
//!
//! `CompilationContext` is what the host knows about the compilation itself:
//! target, optimization level, lint flags, toolchain versions. `extract` is
//! the pure projection of that context (plus explicit overrides from the
//! property map) into the metadata fields of [`Facts`](crate::Facts).

use serde::Serialize;
use tracing::debug;

use crate::{
    config::{Properties, keys},
    process::{CancellationToken, CommandError, CommandRunner, CommandSpec},
};

/// Optimization level as reported by cargo's `OPT_LEVEL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OptimizationLevel {
    /// `OPT_LEVEL` was not supplied.
    #[default]
    Unknown,
    Debug,
    Release,
}

impl OptimizationLevel {
    /// `0` is a debug build; `1`-`3`, `s` and `z` all optimise.
    pub fn from_opt_level(raw: &str) -> Self {
        match raw.trim() {
            "" => Self::Unknown,
            "0" => Self::Debug,
            _ => Self::Release,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Unknown => "",
            Self::Debug => "Debug",
            Self::Release => "Release",
        }
    }
}

/// What the host knows about the current compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilationContext {
    pub target_arch: String,
    pub target_triple: String,
    pub optimization: OptimizationLevel,
    /// Raw `CARGO_ENCODED_RUSTFLAGS`, `None` when the host did not pass it.
    pub rustflags: Option<Vec<String>>,
    pub source_date_epoch: Option<i64>,
    pub language_version: String,
    pub compiler_version: String,
    pub toolchain_version: String,
}

impl CompilationContext {
    /// Build the context from cargo's build-script variables.
    pub fn from_properties(props: &Properties) -> Self {
        Self {
            target_arch: props.resolve(keys::TARGET_ARCH, &[], ""),
            target_triple: props.resolve(keys::TARGET, &[], ""),
            optimization: OptimizationLevel::from_opt_level(&props.resolve(keys::OPT_LEVEL, &[], "")),
            rustflags: props.get(keys::ENCODED_RUSTFLAGS).map(|raw| {
                raw.split('\x1f')
                    .filter(|flag| !flag.is_empty())
                    .map(str::to_string)
                    .collect()
            }),
            source_date_epoch: props
                .get(keys::SOURCE_DATE_EPOCH)
                .and_then(|raw| raw.trim().parse().ok()),
            language_version: props.resolve(keys::LANGUAGE_VERSION, &[keys::PKG_RUST_VERSION], ""),
            compiler_version: props.resolve(keys::COMPILER_VERSION, &[keys::RUSTC_VERSION], ""),
            toolchain_version: props.resolve(keys::SDK_VERSION, &[keys::CARGO_VERSION], ""),
        }
    }

    /// Fill missing toolchain versions by running `$RUSTC --version` and
    /// `$CARGO --version`. A failed probe leaves the field empty; only
    /// cancellation is reported.
    pub fn probe_toolchain<R: CommandRunner + ?Sized>(
        &mut self,
        props: &Properties,
        runner: &R,
        cancel: &CancellationToken,
    ) -> Result<(), CommandError> {
        if self.compiler_version.is_empty() {
            let rustc = props.resolve(keys::RUSTC, &[], "rustc");
            self.compiler_version = probe_version(runner, &rustc, cancel)?;
        }
        if self.toolchain_version.is_empty() {
            let cargo = props.resolve(keys::CARGO, &[], "cargo");
            self.toolchain_version = probe_version(runner, &cargo, cancel)?;
        }
        Ok(())
    }
}

fn probe_version<R: CommandRunner + ?Sized>(
    runner: &R,
    program: &str,
    cancel: &CancellationToken,
) -> Result<String, CommandError> {
    match runner.run(&CommandSpec::new(program, ["--version"]), cancel) {
        Ok(version) => Ok(version),
        Err(err) if err.is_cancelled() => Err(err),
        Err(err) => {
            debug!(program, %err, "toolchain probe failed");
            Ok(String::new())
        }
    }
}

/// The compiler/session slice of the facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CompilationMetadata {
    pub platform: String,
    pub warning_level: u32,
    pub configuration: String,
    pub is_release_build: bool,
    pub nullability: String,
    pub deterministic: bool,
    pub target_framework_moniker: String,
    pub language: String,
    pub language_version: String,
    pub compiler_version: String,
    pub host_runtime_version: String,
}

pub const LANGUAGE: &str = "Rust";

/// Project a context onto the metadata fields.
///
/// An explicit configuration label (`BUILDFACTS_CONFIGURATION`, then cargo's
/// `PROFILE`) wins over the label derived from the optimization level, since
/// custom profiles do not map onto Debug/Release.
pub fn extract(ctx: &CompilationContext, props: &Properties) -> CompilationMetadata {
    let configuration = props.resolve(keys::CONFIGURATION, &[keys::PROFILE], ctx.optimization.label());
    let warning_level = props
        .lookup(keys::WARNING_LEVEL, &[])
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or_else(|| warning_level_from_rustflags(ctx.rustflags.as_deref()));

    CompilationMetadata {
        platform: ctx.target_arch.clone(),
        warning_level,
        configuration,
        is_release_build: ctx.optimization == OptimizationLevel::Release,
        nullability: props.resolve(keys::NULLABLE, &[], ""),
        deterministic: props.resolve_bool(keys::DETERMINISTIC, &[]) || ctx.source_date_epoch.is_some(),
        target_framework_moniker: ctx.target_triple.clone(),
        language: LANGUAGE.to_string(),
        language_version: ctx.language_version.clone(),
        compiler_version: ctx.compiler_version.clone(),
        host_runtime_version: ctx.toolchain_version.clone(),
    }
}

/// Level of the `warnings` lint group implied by the rustflags:
/// 0 allowed (or unknown), 1 warn (rustc's default), 2 denied or forbidden.
/// The last flag naming the group wins, as it does in rustc.
pub fn warning_level_from_rustflags(flags: Option<&[String]>) -> u32 {
    let Some(flags) = flags else {
        return 0;
    };

    let mut level = 1;
    let mut pending: Option<&str> = None;
    for flag in flags {
        let flag = flag.as_str();
        let (switch, lint) = match pending.take() {
            Some(switch) => (switch, flag),
            None => match split_lint_flag(flag) {
                Some((switch, Some(lint))) => (switch, lint),
                Some((switch, None)) => {
                    pending = Some(switch);
                    continue;
                }
                None => continue,
            },
        };
        if lint == "warnings" {
            level = match switch {
                "A" => 0,
                "W" => 1,
                _ => 2,
            };
        }
    }
    level
}

/// `-Dwarnings` → ("D", Some("warnings")); `--deny` → ("D", None).
fn split_lint_flag(flag: &str) -> Option<(&'static str, Option<&str>)> {
    const LONG: &[(&str, &str)] = &[
        ("--allow", "A"),
        ("--warn", "W"),
        ("--deny", "D"),
        ("--forbid", "F"),
    ];
    for &(long, switch) in LONG {
        if let Some(rest) = flag.strip_prefix(long) {
            return match rest.strip_prefix('=') {
                Some(lint) => Some((switch, Some(lint))),
                None if rest.is_empty() => Some((switch, None)),
                None => None,
            };
        }
    }

    let rest = flag.strip_prefix('-')?;
    let switch = match rest.chars().next()? {
        'A' => "A",
        'W' => "W",
        'D' => "D",
        'F' => "F",
        _ => return None,
    };
    let lint = &rest[1..];
    Some((switch, (!lint.is_empty()).then_some(lint)))
}
