//
// ──────────────────────────────────────────────────────────────────────────────
//  CODE EMISSION
// ──────────────────────────────────────────────────────────────────────────────
//
// Facts become Rust source in three steps:
//
//   1. Bindings. Each fact is turned into (name, type, literal, doc) in a
//      fixed order. Literals are escaped here, before they reach the template,
//      so nothing environment-controlled can break out of a string literal.
//   2. Unit body. A MiniJinja template lays the bindings out as associated
//      constants of a unit struct (`BuildInformation`, `GitInformation`).
//   3. Module wrapping. When a root namespace is configured the body is
//      indented into nested `pub mod` blocks, one per namespace segment.
//
// The order of bindings below is part of the output contract: regenerating
// with unchanged inputs (other than the clock) changes a single line.
//

use std::fmt::Write as _;

use minijinja::{Environment, context};
use serde::Serialize;
use snafu::ResultExt;
use tracing::debug;

use crate::{
    error::{Result, TemplateSnafu},
    facts::Facts,
    git::GitFacts,
};

const UNIT_TEMPLATE: &str = r#"/// {{ summary }}
#[allow(dead_code)]
pub struct {{ name }};

#[allow(dead_code, non_upper_case_globals)]
impl {{ name }} {
{% for binding in bindings %}
{% if not loop.first %}

{% endif %}
    /// {{ binding.doc }}
    pub const {{ binding.name }}: {{ binding.ty }} = {{ binding.literal }};
{% endfor %}
}
"#;

const INDENT: &str = "    ";

/// Semantic type of an emitted constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LiteralType {
    Text,
    Integer,
    Boolean,
    /// RFC 3339 string in UTC.
    Timestamp,
}

impl LiteralType {
    pub fn rust_type(self) -> &'static str {
        match self {
            Self::Text | Self::Timestamp => "&'static str",
            Self::Integer => "u32",
            Self::Boolean => "bool",
        }
    }
}

/// One emitted constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub name: &'static str,
    #[serde(skip)]
    pub kind: LiteralType,
    /// Rust type as written in the source.
    pub ty: &'static str,
    /// Literal, already escaped.
    pub literal: String,
    pub doc: &'static str,
}

impl Binding {
    pub fn text(name: &'static str, doc: &'static str, value: &str) -> Self {
        Self::new(name, doc, LiteralType::Text, quote(value))
    }

    pub fn integer(name: &'static str, doc: &'static str, value: u32) -> Self {
        Self::new(name, doc, LiteralType::Integer, value.to_string())
    }

    pub fn boolean(name: &'static str, doc: &'static str, value: bool) -> Self {
        Self::new(name, doc, LiteralType::Boolean, value.to_string())
    }

    pub fn timestamp(name: &'static str, doc: &'static str, value: &str) -> Self {
        Self::new(name, doc, LiteralType::Timestamp, quote(value))
    }

    fn new(name: &'static str, doc: &'static str, kind: LiteralType, literal: String) -> Self {
        Self {
            name,
            kind,
            ty: kind.rust_type(),
            literal,
            doc,
        }
    }
}

/// Build facts in emission order.
pub fn build_bindings(facts: &Facts) -> Vec<Binding> {
    vec![
        Binding::timestamp("BuildAt", "Returns the build date (UTC, RFC 3339).", &facts.build_at()),
        Binding::text("Platform", "Returns the target architecture.", &facts.platform),
        Binding::integer("WarningLevel", "Returns the warning level.", facts.warning_level),
        Binding::text("Configuration", "Returns the build configuration.", &facts.configuration),
        Binding::text("AssemblyVersion", "Returns the package version.", &facts.assembly_version),
        Binding::text(
            "AssemblyFileVersion",
            "Returns the package file version.",
            &facts.assembly_file_version,
        ),
        Binding::text("AssemblyName", "Returns the package name.", &facts.assembly_name),
        Binding::text("AssemblyCopyright", "Returns the copyright notice.", &facts.assembly_copyright),
        Binding::text("AssemblyCompany", "Returns the company.", &facts.assembly_company),
        Binding::text(
            "TargetFrameworkMoniker",
            "Returns the target triple.",
            &facts.target_framework_moniker,
        ),
        Binding::text("Nullability", "Returns the nullability level.", &facts.nullability),
        Binding::boolean("Deterministic", "Returns whether the build is deterministic.", facts.deterministic),
        Binding::text("AnalysisLevel", "Returns the analysis level.", &facts.analysis_level),
        Binding::text("ProjectDirectory", "Returns the project directory.", &facts.project_directory),
        Binding::text("Language", "Returns the language.", &facts.language),
        Binding::text("LanguageVersion", "Returns the language version.", &facts.language_version),
        Binding::boolean("IsReleaseBuild", "Returns whether this is an optimized build.", facts.is_release_build),
        Binding::text("CompilerVersion", "Returns the compiler version.", &facts.compiler_version),
        Binding::text(
            "DotNetSdkVersion",
            "Returns the host toolchain version.",
            &facts.host_runtime_version,
        ),
    ]
}

/// Git facts in emission order.
pub fn git_bindings(git: &GitFacts) -> Vec<Binding> {
    vec![
        Binding::text("Branch", "Returns the branch name.", &git.branch),
        Binding::text("CommitHash", "Returns the full commit hash.", &git.commit_hash),
        Binding::text("ShortCommitHash", "Returns the abbreviated commit hash.", git.short_commit_hash()),
        Binding::text("NearestTag", "Returns the nearest tag.", &git.nearest_tag),
        Binding::text(
            "DetailedTagDescription",
            "Returns the detailed tag description (`git describe --tags`).",
            &git.detailed_description,
        ),
    ]
}

/// Escape a value for use inside a Rust string literal.
pub fn escape_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\0' => out.push_str("\\0"),
            c if c.is_control() => {
                let _ = write!(out, "\\u{{{:x}}}", u32::from(c));
            }
            c => out.push(c),
        }
    }
    out
}

/// `value` as a quoted, escaped string literal.
pub fn quote(value: &str) -> String {
    format!("\"{}\"", escape_literal(value))
}

/// Split a namespace on `::` or `.` into module identifiers. Characters that
/// are not ASCII identifier characters become `_`.
pub fn namespace_segments(namespace: &str) -> Vec<String> {
    namespace
        .split("::")
        .flat_map(|part| part.split('.'))
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(sanitize_identifier)
        .collect()
}

fn sanitize_identifier(raw: &str) -> String {
    let mut ident: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if ident.starts_with(|c: char| c.is_ascii_digit()) {
        ident.insert(0, '_');
    }
    if is_keyword(&ident) {
        ident.push('_');
    }
    ident
}

fn is_keyword(ident: &str) -> bool {
    const KEYWORDS: &[&str] = &[
        "as", "async", "await", "break", "const", "continue", "crate", "dyn", "else", "enum", "extern",
        "false", "fn", "for", "gen", "if", "impl", "in", "let", "loop", "match", "mod", "move", "mut",
        "pub", "ref", "return", "self", "Self", "static", "struct", "super", "trait", "true", "type",
        "unsafe", "use", "where", "while", "_",
    ];
    KEYWORDS.contains(&ident)
}

/// Wrap `body` in nested modules. An empty namespace leaves it untouched.
pub fn wrap_in_namespace(body: &str, namespace: &str) -> String {
    let segments = namespace_segments(namespace);
    if segments.is_empty() {
        return body.to_string();
    }

    let mut out = String::new();
    for (depth, segment) in segments.iter().enumerate() {
        let pad = INDENT.repeat(depth);
        let _ = writeln!(out, "{pad}pub mod {segment} {{");
        if depth == 0 {
            let _ = writeln!(out, "{INDENT}#![allow(non_snake_case)]");
            out.push('\n');
        }
    }

    let pad = INDENT.repeat(segments.len());
    for line in body.lines() {
        if line.is_empty() {
            out.push('\n');
        } else {
            let _ = writeln!(out, "{pad}{line}");
        }
    }

    for depth in (0..segments.len()).rev() {
        let _ = writeln!(out, "{}}}", INDENT.repeat(depth));
    }
    out
}

/// A named generated-source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedSource {
    /// Type name declared by the unit.
    pub name: &'static str,
    /// File the unit is written to.
    pub file_name: &'static str,
    pub text: String,
}

pub const BUILD_UNIT: &str = "BuildInformation";
pub const GIT_UNIT: &str = "GitInformation";

/// Renders facts into Rust source.
pub struct CodeEmitter {
    env: Environment<'static>,
}

impl Default for CodeEmitter {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeEmitter {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        Self { env }
    }

    /// Body of one unit, without module wrapping.
    fn render_body(&self, name: &str, summary: &str, bindings: &[Binding]) -> Result<String> {
        let mut text = self
            .env
            .render_str(UNIT_TEMPLATE, context! { name, summary, bindings })
            .context(TemplateSnafu { unit: name })?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Ok(text)
    }

    fn build_body(&self, facts: &Facts) -> Result<String> {
        self.render_body(
            BUILD_UNIT,
            "Facts about the build that produced this crate.",
            &build_bindings(facts),
        )
    }

    fn git_body(&self, git: &GitFacts) -> Result<String> {
        self.render_body(
            GIT_UNIT,
            "Version-control state at build time.",
            &git_bindings(git),
        )
    }

    /// The `BuildInformation` unit.
    pub fn render_build(&self, facts: &Facts) -> Result<String> {
        Ok(wrap_in_namespace(&self.build_body(facts)?, &facts.root_namespace))
    }

    /// The `GitInformation` unit, under the same namespace as the build facts.
    pub fn render_git(&self, git: &GitFacts, namespace: &str) -> Result<String> {
        Ok(wrap_in_namespace(&self.git_body(git)?, namespace))
    }

    /// Both groups in one unit; the git group only when present.
    pub fn render(&self, facts: &Facts, git: Option<&GitFacts>) -> Result<String> {
        let mut body = self.build_body(facts)?;
        if let Some(git) = git {
            body.push('\n');
            body.push_str(&self.git_body(git)?);
        }
        Ok(wrap_in_namespace(&body, &facts.root_namespace))
    }

    /// Named units for the host: `BuildInformation` always, `GitInformation`
    /// when git info is enabled. Each unit carries its own namespace modules,
    /// so under a namespace only one of them may be included per scope; use
    /// [`render`](Self::render) to get both groups in one module tree.
    pub fn units(&self, facts: &Facts, git: Option<&GitFacts>) -> Result<Vec<GeneratedSource>> {
        let mut units = vec![GeneratedSource {
            name: BUILD_UNIT,
            file_name: "build_information.rs",
            text: self.render_build(facts)?,
        }];
        if let Some(git) = git {
            units.push(GeneratedSource {
                name: GIT_UNIT,
                file_name: "git_information.rs",
                text: self.render_git(git, &facts.root_namespace)?,
            });
        }
        debug!(units = units.len(), "rendered units");
        Ok(units)
    }
}
