//! Cargo build-script binding: writes the rendered units into `OUT_DIR` and
//! tells cargo when to regenerate them.

use std::{
    fs,
    path::{Path, PathBuf},
};

use snafu::{OptionExt, ResultExt};
use tracing::{debug, info};

use crate::{
    GeneratedSources, GenerationInput,
    attributes::PackageAttributes,
    config::{Properties, keys},
    context::CompilationContext,
    error::{MissingOutDirSnafu, Result, WriteUnitSnafu},
    facts::clock_from_properties,
    generate,
    git::GitStrategy,
    process::{CancellationToken, SystemCommandRunner},
};

/// Both groups in one file, for crates that set a root namespace. The
/// per-unit files each open the namespace modules themselves, so only one of
/// them can be included into a given scope.
pub const COMBINED_FILE: &str = "build_facts.rs";

/// `OUT_DIR` as set by cargo.
pub fn out_dir(props: &Properties) -> Result<PathBuf> {
    props.get(keys::OUT_DIR).map(PathBuf::from).context(MissingOutDirSnafu)
}

/// Write every unit plus the combined file into `dir`. Files whose content is
/// unchanged are left alone so their mtime does not trigger rebuilds.
pub fn write_units(dir: &Path, sources: &GeneratedSources) -> Result<Vec<PathBuf>> {
    let files = sources
        .units
        .iter()
        .map(|unit| (unit.file_name, unit.text.as_str()))
        .chain(std::iter::once((COMBINED_FILE, sources.combined.as_str())));

    let mut written = Vec::new();
    for (file_name, text) in files {
        let path = dir.join(file_name);
        write_if_changed(&path, text)?;
        written.push(path);
    }
    Ok(written)
}

fn write_if_changed(path: &Path, text: &str) -> Result<()> {
    if fs::read_to_string(path).is_ok_and(|existing| existing == text) {
        debug!(path = %path.display(), "unit unchanged");
        return Ok(());
    }
    fs::write(path, text).context(WriteUnitSnafu { path })?;
    info!(path = %path.display(), "wrote unit");
    Ok(())
}

/// `cargo:` directives that make cargo re-run the build script when an input
/// changes.
pub fn rerun_directives(props: &Properties, strategy: &GitStrategy) -> Vec<String> {
    let mut lines: Vec<String> = keys::ALL
        .iter()
        .map(|key| format!("cargo:rerun-if-env-changed={key}"))
        .collect();

    if matches!(strategy, GitStrategy::Process { .. }) {
        if let Some(git_dir) = props.get(keys::MANIFEST_DIR).and_then(|dir| find_git_dir(Path::new(dir))) {
            // Worktrees keep HEAD private but share refs with the main repository.
            let common = common_dir(&git_dir);
            let head = git_dir.join("HEAD");
            lines.push(format!("cargo:rerun-if-changed={}", head.display()));
            if let Some(reference) = head_reference(&head) {
                lines.push(format!("cargo:rerun-if-changed={}", common.join(reference).display()));
            }
            lines.push(format!("cargo:rerun-if-changed={}", common.join("refs/tags").display()));
        }
    }
    lines
}

/// Git directory of the repository containing `start`. A `.git` file (as in
/// worktrees and submodules) is followed through its `gitdir:` line.
pub fn find_git_dir(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        let candidate = dir.join(".git");
        if candidate.is_dir() {
            return Some(candidate);
        }
        if candidate.is_file() {
            let target = read_pointer(&candidate, "gitdir:")?;
            let git_dir = dir.join(target);
            return git_dir.is_dir().then_some(git_dir);
        }
        None
    })
}

/// Where shared refs live: `commondir` for a linked worktree, the git
/// directory itself otherwise.
fn common_dir(git_dir: &Path) -> PathBuf {
    match fs::read_to_string(git_dir.join("commondir")) {
        Ok(content) if !content.trim().is_empty() => git_dir.join(content.trim()),
        _ => git_dir.to_path_buf(),
    }
}

fn read_pointer(file: &Path, prefix: &str) -> Option<PathBuf> {
    let content = fs::read_to_string(file).ok()?;
    content
        .lines()
        .find_map(|line| line.strip_prefix(prefix))
        .map(|target| PathBuf::from(target.trim()))
}

/// `refs/heads/main` when HEAD is a symbolic ref.
fn head_reference(head: &Path) -> Option<String> {
    let content = fs::read_to_string(head).ok()?;
    content
        .trim()
        .strip_prefix("ref: ")
        .map(str::to_string)
}

/// Run the whole pipeline from inside a build script.
///
/// Reads cargo's environment, writes `build_information.rs`,
/// `git_information.rs` (when git info is enabled) and `build_facts.rs` into
/// `OUT_DIR`, and prints the rerun directives.
///
/// With a root namespace configured, include either `build_facts.rs` or a
/// single per-unit file: the per-unit files each declare the namespace
/// modules, so including both into one scope is a duplicate-module error.
pub fn generate_for_build_script() -> Result<GeneratedSources> {
    let props = Properties::from_env();
    let out_dir = out_dir(&props)?;

    let runner = match props.get(keys::MANIFEST_DIR) {
        Some(dir) => SystemCommandRunner::in_dir(dir),
        None => SystemCommandRunner::new(),
    };
    let attributes = PackageAttributes::from_properties(&props);
    let clock = clock_from_properties(&props);
    let cancel = CancellationToken::new();

    let sources = generate(&GenerationInput {
        context: CompilationContext::from_properties(&props),
        properties: &props,
        attributes: &attributes,
        clock: clock.as_ref(),
        runner: &runner,
        cancel: &cancel,
    })?;

    write_units(&out_dir, &sources)?;
    for line in rerun_directives(&props, &GitStrategy::from_properties(&props)) {
        println!("{line}");
    }
    Ok(sources)
}
