//! Value templates used by path arguments and environment rules.
//!
//! `{prefix}` is the package's own install prefix, `{prefix:hip}` a dependency's,
//! `{version}` the resolved version and `{name}` the value of variant `name`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::core::selection::Selection;
use crate::core::version::PackageVersion;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid template `{input}`: {message}")]
pub struct TemplateParseError {
    pub input: String,
    pub message: String,
}

/// A placeholder that could not be filled.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("no install prefix known for `{name}`")]
    UnresolvedPrefix { name: String },

    #[error("variant `{name}` has no value")]
    UnsetVariant { name: String },

    #[error("no package version is known")]
    MissingVersion,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Prefix(Option<String>),
    Version,
    Variant(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    raw: String,
    segments: Vec<Segment>,
}

/// What a template may refer to.
pub struct TemplateContext<'a> {
    pub package: &'a str,
    pub selection: &'a Selection,
    pub version: Option<&'a PackageVersion>,
    pub prefixes: &'a BTreeMap<String, PathBuf>,
}

impl Template {
    /// A template with no placeholders.
    pub fn literal(s: impl Into<String>) -> Self {
        let raw = s.into();
        Template {
            segments: vec![Segment::Literal(raw.clone())],
            raw,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Dependency names whose prefixes this template needs. `None` is the package itself.
    pub fn prefixes(&self) -> impl Iterator<Item = Option<&str>> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Prefix(name) => Some(name.as_deref()),
            _ => None,
        })
    }

    pub fn render(&self, ctx: &TemplateContext<'_>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Prefix(name) => {
                    let name = name.as_deref().unwrap_or(ctx.package);
                    let path = ctx
                        .prefixes
                        .get(name)
                        .ok_or_else(|| TemplateError::UnresolvedPrefix {
                            name: name.to_string(),
                        })?;
                    out.push_str(&path.display().to_string());
                }
                Segment::Version => {
                    let version = ctx.version.ok_or(TemplateError::MissingVersion)?;
                    out.push_str(version.as_str());
                }
                Segment::Variant(name) => {
                    let value = ctx
                        .selection
                        .get(name)
                        .ok_or_else(|| TemplateError::UnsetVariant { name: name.clone() })?;
                    out.push_str(&value.to_string());
                }
            }
        }
        Ok(out)
    }
}

impl FromStr for Template {
    type Err = TemplateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |message: &str| TemplateParseError {
            input: s.to_string(),
            message: message.to_string(),
        };

        let mut segments = Vec::new();
        let mut rest = s;
        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| error("unclosed `{`"))?;
            let placeholder = after[..close].trim();
            let segment = match placeholder.split_once(':') {
                Some(("prefix", dep)) if !dep.is_empty() => Segment::Prefix(Some(dep.to_string())),
                Some(_) => return Err(error("expected `{prefix:<name>}`")),
                None => match placeholder {
                    "" => return Err(error("empty placeholder")),
                    "prefix" => Segment::Prefix(None),
                    "version" => Segment::Version,
                    name => Segment::Variant(name.to_string()),
                },
            };
            segments.push(segment);
            rest = &after[close + 1..];
        }
        if rest.contains('}') {
            return Err(error("unmatched `}`"));
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Template {
            raw: s.to_string(),
            segments,
        })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_prefixes() {
        let prefixes = BTreeMap::from([
            ("vistle".to_string(), PathBuf::from("/opt/vistle")),
            ("hip".to_string(), PathBuf::from("/opt/rocm")),
        ]);
        let selection = Selection::new().with("build_type", "Release");
        let version = PackageVersion::new("2024.2");
        let ctx = TemplateContext {
            package: "vistle",
            selection: &selection,
            version: Some(&version),
            prefixes: &prefixes,
        };

        let t: Template = "{prefix}/lib".parse().unwrap();
        assert_eq!(t.render(&ctx).unwrap(), "/opt/vistle/lib");

        let t: Template = "{prefix:hip}/bin/hipcc".parse().unwrap();
        assert_eq!(t.render(&ctx).unwrap(), "/opt/rocm/bin/hipcc");

        let t: Template = "vistle-{version}-{build_type}".parse().unwrap();
        assert_eq!(t.render(&ctx).unwrap(), "vistle-2024.2-Release");
    }

    #[test]
    fn test_render_errors() {
        let prefixes = BTreeMap::new();
        let selection = Selection::new();
        let ctx = TemplateContext {
            package: "vistle",
            selection: &selection,
            version: None,
            prefixes: &prefixes,
        };
        let t: Template = "{prefix:hip}/bin".parse().unwrap();
        assert_eq!(
            t.render(&ctx).unwrap_err(),
            TemplateError::UnresolvedPrefix { name: "hip".to_string() }
        );
        let t: Template = "{version}".parse().unwrap();
        assert_eq!(t.render(&ctx).unwrap_err(), TemplateError::MissingVersion);
    }

    #[test]
    fn test_parse_errors() {
        assert!("{prefix".parse::<Template>().is_err());
        assert!("{}".parse::<Template>().is_err());
        assert!("a}".parse::<Template>().is_err());
        assert!("{prefix:}".parse::<Template>().is_err());
        assert_eq!("plain".parse::<Template>().unwrap(), Template::literal("plain"));
    }

    #[test]
    fn test_prefix_references() {
        let t: Template = "{prefix}:{prefix:hip}".parse().unwrap();
        let refs: Vec<_> = t.prefixes().collect();
        assert_eq!(refs, vec![None, Some("hip")]);
    }
}
