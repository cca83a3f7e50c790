use std::path::PathBuf;

use buildfacts::{
    CancellationToken, CompilationContext, GenerationInput, PackageAttributes, Properties,
    SystemCommandRunner, config, facts, generate, keys, sink,
};
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

//
// ──────────────────────────────────────────────────────────────────────────────
//  CLI ARGUMENTS
// ──────────────────────────────────────────────────────────────────────────────
//
// The CLI runs the same pipeline a build script does, but takes its
// properties from a YAML file and `--set` overrides (optionally layered over
// the current environment). It is meant for inspecting what a build would
// emit without running cargo.
//

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILDFACTS_TOOL_GIT_HASH"),
    " ",
    env!("BUILDFACTS_TOOL_BUILT_AT"),
    ")"
);

#[derive(Parser, Debug)]
#[command(name = "buildfacts", version, long_version = LONG_VERSION, about)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the generated Rust source.
    Render {
        #[command(flatten)]
        input: InputArgs,

        /// Write the unit files into this directory instead of printing the
        /// combined unit.
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Print the resolved facts as JSON.
    Facts {
        #[command(flatten)]
        input: InputArgs,
    },
    /// List the recognised property keys.
    Keys,
}

#[derive(Args, Debug)]
struct InputArgs {
    /// Flat YAML mapping of build properties.
    #[arg(short, long, env = "BUILDFACTS_PROPERTIES_FILE")]
    properties: Option<PathBuf>,

    /// Property override, `KEY=VALUE`. May be repeated; later ones win.
    #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_set)]
    set: Vec<(String, String)>,

    /// Start from the current process environment.
    #[arg(long)]
    env: bool,

    /// Pin the build instant (RFC 3339) instead of reading the clock.
    #[arg(long, value_parser = parse_timestamp)]
    timestamp: Option<chrono::DateTime<chrono::Utc>>,

    /// Directory git and toolchain commands run in.
    #[arg(long)]
    dir: Option<PathBuf>,
}

fn parse_set(raw: &str) -> Result<(String, String), String> {
    config::parse_assignment(raw).ok_or_else(|| format!("expected KEY=VALUE, got `{raw}`"))
}

fn parse_timestamp(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, String> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&chrono::Utc))
        .map_err(|err| format!("invalid RFC 3339 timestamp `{raw}`: {err}"))
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  PROPERTY LAYERING
// ──────────────────────────────────────────────────────────────────────────────
//
// Layers, lowest precedence first:
//   1. process environment (only with --env)
//   2. the YAML properties file
//   3. --set overrides, in the order given
//

fn load_properties(input: &InputArgs) -> buildfacts::Result<Properties> {
    let mut props = if input.env {
        Properties::from_env()
    } else {
        Properties::new()
    };

    if let Some(path) = &input.properties {
        props.extend(Properties::from_yaml_file(path)?);
    }

    for (key, value) in &input.set {
        props.insert(key.clone(), value.clone());
    }
    Ok(props)
}

fn run_pipeline(input: &InputArgs) -> buildfacts::Result<buildfacts::GeneratedSources> {
    let props = load_properties(input)?;
    info!(properties = props.len(), "loaded properties");

    let clock: Box<dyn buildfacts::Clock> = match input.timestamp {
        Some(ts) => Box::new(buildfacts::FixedClock(ts)),
        None => facts::clock_from_properties(&props),
    };
    let runner = match &input.dir {
        Some(dir) => SystemCommandRunner::in_dir(dir),
        None => SystemCommandRunner::new(),
    };
    let attributes = PackageAttributes::from_properties(&props);
    let cancel = CancellationToken::new();

    generate(&GenerationInput {
        context: CompilationContext::from_properties(&props),
        properties: &props,
        attributes: &attributes,
        clock: clock.as_ref(),
        runner: &runner,
        cancel: &cancel,
    })
}

#[derive(Serialize)]
struct FactsReport<'a> {
    build: &'a buildfacts::Facts,
    #[serde(skip_serializing_if = "Option::is_none")]
    git: Option<&'a buildfacts::GitFacts>,
}

//
// ──────────────────────────────────────────────────────────────────────────────
//  MAIN EXECUTION PIPELINE
// ──────────────────────────────────────────────────────────────────────────────
//

fn main() -> miette::Result<()> {
    // Panics get color-eyre's report; handled errors go through miette.
    color_eyre::install().map_err(|err| miette::miette!("{err}"))?;

    // Respect RUST_LOG or default to warnings only. Logs go to stderr so that
    // rendered source on stdout stays clean.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_filter(filter),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render { input, out_dir } => {
            let sources = run_pipeline(&input)?;
            match out_dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir).into_diagnostic()?;
                    for path in sink::write_units(&dir, &sources)? {
                        println!("{}", path.display());
                    }
                }
                None => print!("{}", sources.combined),
            }
        }
        Command::Facts { input } => {
            let sources = run_pipeline(&input)?;
            let report = FactsReport {
                build: &sources.facts,
                git: sources.git.as_ref(),
            };
            println!("{}", serde_json::to_string_pretty(&report).into_diagnostic()?);
        }
        Command::Keys => {
            for key in keys::ALL {
                println!("{key}");
            }
        }
    }

    Ok(())
}
