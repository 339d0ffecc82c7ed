//! Conditional dependency declarations.
//!
//! A declaration names a target package, the phases in which it is needed and the
//! variant values it should be built with. Declarations are written in spec form,
//! e.g. `kokkos@4: +rocm amdgpu_target={amdgpu_target}`.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::condition::{tokenize, Condition, ConditionParseError, Token};
use crate::core::selection::Selection;
use crate::core::variant::NONE_VALUE;
use crate::core::version::VersionRange;

/// Phase in which a dependency is required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Build,
    Link,
    Run,
}

impl Linkage {
    /// The linkage used when a declaration names none: build and link.
    pub fn defaults() -> BTreeSet<Linkage> {
        BTreeSet::from([Linkage::Build, Linkage::Link])
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Linkage::Build => "build",
            Linkage::Link => "link",
            Linkage::Run => "run",
        }
    }
}

impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Linkage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "build" => Ok(Linkage::Build),
            "link" => Ok(Linkage::Link),
            "run" => Ok(Linkage::Run),
            other => Err(format!(
                "unknown dependency type `{}` (expected build, link or run)",
                other
            )),
        }
    }
}

/// Value a dependency is asked to build one of its variants with.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropagatedValue {
    Literal(String),
    /// `{name}`: every value the package's own variant `name` resolves to
    FromVariant(String),
}

impl PropagatedValue {
    fn parse(raw: &str) -> Self {
        match raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            Some(name) => PropagatedValue::FromVariant(name.to_string()),
            None => PropagatedValue::Literal(raw.to_string()),
        }
    }

    /// Expand against the package's resolved selection.
    ///
    /// A variant reference yields one value per selected value. An absent variant
    /// and the `none` sentinel yield nothing.
    pub fn expand(&self, selection: &Selection) -> Vec<String> {
        match self {
            PropagatedValue::Literal(v) => vec![v.clone()],
            PropagatedValue::FromVariant(name) => selection
                .get(name)
                .map(|value| value.values())
                .unwrap_or_default()
                .into_iter()
                .filter(|v| v != NONE_VALUE)
                .collect(),
        }
    }
}

impl fmt::Display for PropagatedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagatedValue::Literal(v) => f.write_str(v),
            PropagatedValue::FromVariant(name) => write!(f, "{{{}}}", name),
        }
    }
}

/// A conditional requirement on another package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDeclaration {
    pub target: String,
    pub version: Option<VersionRange>,
    pub linkage: BTreeSet<Linkage>,
    /// Effective condition, scopes already conjoined
    pub condition: Condition,
    pub propagated: Vec<(String, PropagatedValue)>,
}

impl DependencyDeclaration {
    /// Create a build+link dependency with no condition.
    pub fn new(target: impl Into<String>) -> Self {
        DependencyDeclaration {
            target: target.into(),
            version: None,
            linkage: Linkage::defaults(),
            condition: Condition::Always,
            propagated: Vec::new(),
        }
    }

    /// Parse a dependency spec: a target name followed by an optional version range
    /// and variant requirements.
    pub fn parse(spec: &str) -> Result<Self, ConditionParseError> {
        let mut tokens = tokenize(spec)?.into_iter();
        let target = match tokens.next() {
            Some(Token::Name(name)) => name,
            _ => {
                return Err(ConditionParseError::new(
                    spec,
                    "a dependency must start with a package name",
                ))
            }
        };

        let mut dep = DependencyDeclaration::new(target);
        for token in tokens {
            match token {
                Token::Version(range) => {
                    if dep.version.is_some() {
                        return Err(ConditionParseError::new(spec, "version given twice"));
                    }
                    dep.version = Some(range.parse()?);
                }
                Token::Enable(name) => dep
                    .propagated
                    .push((name, PropagatedValue::Literal("true".to_string()))),
                Token::Disable(name) => dep
                    .propagated
                    .push((name, PropagatedValue::Literal("false".to_string()))),
                Token::Assign(name, values) => {
                    for value in values {
                        dep.propagated
                            .push((name.clone(), PropagatedValue::parse(&value)));
                    }
                }
                _ => {
                    return Err(ConditionParseError::new(
                        spec,
                        "only a version and variant values may follow the package name",
                    ))
                }
            }
        }

        Ok(dep)
    }

    pub fn with_linkage(mut self, linkage: impl IntoIterator<Item = Linkage>) -> Self {
        self.linkage = linkage.into_iter().collect();
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = self.condition.and(condition);
        self
    }

    /// Variant names this declaration reads from the package's own selection.
    pub fn referenced_variants(&self) -> BTreeSet<&str> {
        let mut out = self.condition.referenced_variants();
        for (_, value) in &self.propagated {
            if let PropagatedValue::FromVariant(name) = value {
                out.insert(name.as_str());
            }
        }
        out
    }
}

impl fmt::Display for DependencyDeclaration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.target)?;
        if let Some(version) = &self.version {
            write!(f, "@{}", version)?;
        }
        for (name, value) in &self.propagated {
            write!(f, " {}={}", name, value)?;
        }
        Ok(())
    }
}
