//! Declarative package attributes (version, file version, copyright, company).
//!
//! Each attribute is looked up through an explicit identifier and a typed
//! extractor, never by textual type-name matching. Missing attributes are the
//! normal case for an unannotated package and resolve to an empty string.

use std::collections::BTreeMap;

use tracing::trace;

use crate::config::{Properties, keys};

/// Value of an attribute's first argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Bool(bool),
    /// Array-valued arguments have no single string form.
    List(Vec<AttributeValue>),
}

impl AttributeValue {
    /// String form of a scalar; `None` for lists.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) => Some(s.clone()),
            Self::Integer(n) => Some(n.to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::List(_) => None,
        }
    }
}

/// The attributes the pipeline knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssemblyAttribute {
    Version,
    FileVersion,
    Copyright,
    Company,
}

impl AssemblyAttribute {
    pub const ALL: [Self; 4] = [Self::Version, Self::FileVersion, Self::Copyright, Self::Company];

    pub fn name(self) -> &'static str {
        match self {
            Self::Version => "AssemblyVersion",
            Self::FileVersion => "AssemblyFileVersion",
            Self::Copyright => "AssemblyCopyright",
            Self::Company => "AssemblyCompany",
        }
    }
}

/// Structured access to the attributes declared on a package.
pub trait AttributeSource {
    /// Arguments of the attribute, in declaration order.
    fn arguments(&self, attribute: AssemblyAttribute) -> Option<&[AttributeValue]>;

    /// Identity name of the package.
    fn name(&self) -> &str;
}

type Extractor = fn(&dyn AttributeSource, AssemblyAttribute) -> Option<String>;

fn first_argument_text(source: &dyn AttributeSource, attribute: AssemblyAttribute) -> Option<String> {
    source.arguments(attribute)?.first()?.as_text()
}

/// Versions are text or a bare integer (`AssemblyVersion(2)`); a boolean is
/// not a version.
fn version_text(source: &dyn AttributeSource, attribute: AssemblyAttribute) -> Option<String> {
    match source.arguments(attribute)?.first()? {
        AttributeValue::Text(s) => Some(s.clone()),
        AttributeValue::Integer(n) => Some(n.to_string()),
        AttributeValue::Bool(_) | AttributeValue::List(_) => None,
    }
}

fn extractor_for(attribute: AssemblyAttribute) -> Extractor {
    match attribute {
        AssemblyAttribute::Version | AssemblyAttribute::FileVersion => version_text,
        AssemblyAttribute::Copyright | AssemblyAttribute::Company => first_argument_text,
    }
}

/// Read an attribute as a string; missing or non-scalar values yield "".
pub fn read_attribute(source: &dyn AttributeSource, attribute: AssemblyAttribute) -> String {
    extractor_for(attribute)(source, attribute).unwrap_or_else(|| {
        trace!(attribute = attribute.name(), "attribute missing or unreadable");
        String::new()
    })
}

/// Attribute set of a cargo package, filled from the build properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageAttributes {
    name: String,
    declared: BTreeMap<AssemblyAttribute, Vec<AttributeValue>>,
}

impl PackageAttributes {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: BTreeMap::new(),
        }
    }

    /// `CARGO_PKG_VERSION` is the version; the rest are opt-in properties.
    pub fn from_properties(props: &Properties) -> Self {
        let mut attrs = Self::new(props.resolve(keys::PKG_NAME, &[], ""));
        let declared = [
            (AssemblyAttribute::Version, keys::PKG_VERSION),
            (AssemblyAttribute::FileVersion, keys::FILE_VERSION),
            (AssemblyAttribute::Copyright, keys::COPYRIGHT),
            (AssemblyAttribute::Company, keys::COMPANY),
        ];
        for (attribute, key) in declared {
            if let Some(value) = props.get(key) {
                attrs.declare(attribute, vec![AttributeValue::Text(value.to_string())]);
            }
        }
        attrs
    }

    pub fn declare(&mut self, attribute: AssemblyAttribute, arguments: Vec<AttributeValue>) -> &mut Self {
        self.declared.insert(attribute, arguments);
        self
    }
}

impl AttributeSource for PackageAttributes {
    fn arguments(&self, attribute: AssemblyAttribute) -> Option<&[AttributeValue]> {
        self.declared.get(&attribute).map(Vec::as_slice)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// The package-identity slice of the facts.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AssemblyInfo {
    pub version: String,
    pub file_version: String,
    pub name: String,
    pub copyright: String,
    pub company: String,
}

impl AssemblyInfo {
    pub fn read(source: &dyn AttributeSource) -> Self {
        Self {
            version: read_attribute(source, AssemblyAttribute::Version),
            file_version: read_attribute(source, AssemblyAttribute::FileVersion),
            name: source.name().to_string(),
            copyright: read_attribute(source, AssemblyAttribute::Copyright),
            company: read_attribute(source, AssemblyAttribute::Company),
        }
    }
}
