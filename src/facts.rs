//! The immutable fact snapshot and the pure step that assembles it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::debug;

use crate::{
    attributes::AssemblyInfo,
    config::{Properties, keys},
    context::CompilationMetadata,
};

/// Source of the build instant.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always reports the same instant. Used for tests and for
/// `SOURCE_DATE_EPOCH` builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub DateTime<Utc>);

impl FixedClock {
    /// Clock pinned to a Unix timestamp, if it is representable.
    pub fn from_unix_seconds(secs: i64) -> Option<Self> {
        DateTime::from_timestamp(secs, 0).map(Self)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// `SOURCE_DATE_EPOCH` pins the clock for reproducible builds; otherwise the
/// system clock is used.
pub fn clock_from_properties(props: &Properties) -> Box<dyn Clock> {
    match props
        .get(keys::SOURCE_DATE_EPOCH)
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(FixedClock::from_unix_seconds)
    {
        Some(clock) => Box::new(clock),
        None => Box::new(SystemClock),
    }
}

/// Snapshot of everything known about the build. Every field has a default,
/// so a `Facts` is always complete even when nothing could be resolved.
///
/// New fields may be added; existing ones keep their names and types since
/// downstream code refers to the emitted constants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facts {
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    pub platform: String,
    pub warning_level: u32,
    pub configuration: String,
    pub assembly_version: String,
    pub assembly_file_version: String,
    pub assembly_name: String,
    pub assembly_copyright: String,
    pub assembly_company: String,
    pub target_framework_moniker: String,
    pub nullability: String,
    pub deterministic: bool,
    pub analysis_level: String,
    pub project_directory: String,
    pub language: String,
    pub language_version: String,
    pub is_release_build: bool,
    pub compiler_version: String,
    pub host_runtime_version: String,
    pub root_namespace: String,
}

impl Facts {
    /// All defaults, stamped with `timestamp`.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            platform: String::new(),
            warning_level: 0,
            configuration: String::new(),
            assembly_version: String::new(),
            assembly_file_version: String::new(),
            assembly_name: String::new(),
            assembly_copyright: String::new(),
            assembly_company: String::new(),
            target_framework_moniker: String::new(),
            nullability: String::new(),
            deterministic: false,
            analysis_level: String::new(),
            project_directory: String::new(),
            language: String::new(),
            language_version: String::new(),
            is_release_build: false,
            compiler_version: String::new(),
            host_runtime_version: String::new(),
            root_namespace: String::new(),
        }
    }

    /// Round-trip ISO-8601 form of the build instant.
    pub fn build_at(&self) -> String {
        format_timestamp(&self.timestamp)
    }
}

/// Fixed-width RFC 3339 with nanoseconds and a `Z` suffix, so the value
/// parses back to the same instant.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn serialize_timestamp<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&format_timestamp(timestamp))
}

/// Combine the resolved slices into one `Facts`. Reads the clock once and
/// performs no other I/O.
pub fn aggregate(
    clock: &dyn Clock,
    metadata: CompilationMetadata,
    assembly: AssemblyInfo,
    props: &Properties,
) -> Facts {
    let timestamp = clock.now();

    let facts = Facts {
        timestamp,
        platform: metadata.platform,
        warning_level: metadata.warning_level,
        configuration: metadata.configuration,
        assembly_version: assembly.version,
        assembly_file_version: assembly.file_version,
        assembly_name: assembly.name,
        assembly_copyright: assembly.copyright,
        assembly_company: assembly.company,
        target_framework_moniker: metadata.target_framework_moniker,
        nullability: metadata.nullability,
        deterministic: metadata.deterministic,
        analysis_level: props.resolve(keys::ANALYSIS_LEVEL, &[keys::ANALYSIS_LEVEL_STYLE], ""),
        project_directory: resolve_project_directory(props),
        language: metadata.language,
        language_version: metadata.language_version,
        is_release_build: metadata.is_release_build,
        compiler_version: metadata.compiler_version,
        host_runtime_version: metadata.host_runtime_version,
        root_namespace: resolve_root_namespace(props),
    };

    debug!(
        build_at = %facts.build_at(),
        configuration = %facts.configuration,
        assembly = %facts.assembly_name,
        namespace = %facts.root_namespace,
        "aggregated build facts"
    );
    facts
}

/// Empty unless opted in; the explicit namespace beats the package name.
pub fn resolve_root_namespace(props: &Properties) -> String {
    if !props.resolve_bool(keys::USE_ROOT_NAMESPACE, &[]) {
        return String::new();
    }
    props.resolve(keys::ROOT_NAMESPACE, &[keys::PKG_NAME], "")
}

/// Empty unless local paths are explicitly allowed into the artifact.
pub fn resolve_project_directory(props: &Properties) -> String {
    if !props.resolve_bool(keys::ALLOW_PROJECT_DIRECTORY, &[]) {
        return String::new();
    }
    props.resolve(keys::MANIFEST_DIR, &[], "")
}
