//! Selections: concrete assignments of values to variants.
//!
//! A caller writes a selection as a spec string (`+python~tui amdgpu_target=gfx90a`),
//! optionally with a version (`@2024.2`) and compiler (`%gcc@12`). Selections are
//! immutable values; validation produces a new, complete selection.

use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::condition::{tokenize, ConditionParseError, Token};
use crate::core::facts::CompilerId;
use crate::core::variant::VariantValue;

/// A mapping from variant name to chosen value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Selection {
    values: BTreeMap<String, VariantValue>,
}

impl Selection {
    pub fn new() -> Self {
        Selection::default()
    }

    /// Return a new selection with `name` set to `value`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<VariantValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&VariantValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Whether a boolean variant is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        matches!(self.values.get(name), Some(VariantValue::Bool(true)))
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, VariantValue> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, VariantValue)> for Selection {
    fn from_iter<I: IntoIterator<Item = (String, VariantValue)>>(iter: I) -> Self {
        Selection {
            values: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Selection {
    type Item = (&'a String, &'a VariantValue);
    type IntoIter = btree_map::Iter<'a, String, VariantValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}

/// Renders as a spec string: boolean flags first, then assignments.
impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = String::new();
        let mut assigns = Vec::new();
        for (name, value) in &self.values {
            match value {
                VariantValue::Bool(true) => flags.push_str(&format!("+{}", name)),
                VariantValue::Bool(false) => flags.push_str(&format!("~{}", name)),
                other => assigns.push(format!("{}={}", name, other)),
            }
        }

        let mut parts = Vec::new();
        if !flags.is_empty() {
            parts.push(flags);
        }
        parts.extend(assigns);
        f.write_str(&parts.join(" "))
    }
}

/// A parsed command-line request: selection plus optional version and compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecRequest {
    pub version: Option<String>,
    pub compiler: Option<CompilerId>,
    pub selection: Selection,
}

/// Parse a spec string such as `+python~tui amdgpu_target=gfx90a @2024.2 %gcc@12`.
pub fn parse_spec(input: &str) -> Result<SpecRequest, ConditionParseError> {
    let mut request = SpecRequest::default();
    let mut values = BTreeMap::new();

    for token in tokenize(input)? {
        let (name, value) = match token {
            Token::Enable(name) => (name, VariantValue::Bool(true)),
            Token::Disable(name) => (name, VariantValue::Bool(false)),
            Token::Assign(name, mut vals) => {
                let value = if vals.len() == 1 {
                    VariantValue::Single(vals.remove(0))
                } else {
                    VariantValue::Multi(vals.into_iter().collect::<BTreeSet<_>>())
                };
                (name, value)
            }
            Token::Version(v) => {
                if request.version.replace(v).is_some() {
                    return Err(ConditionParseError::new(input, "version given twice"));
                }
                continue;
            }
            Token::Compiler(name, version) => {
                let compiler = CompilerId::new(name, version.as_deref());
                if request.compiler.replace(compiler).is_some() {
                    return Err(ConditionParseError::new(input, "compiler given twice"));
                }
                continue;
            }
            other => {
                return Err(ConditionParseError::new(
                    input,
                    format!("`{}` is not allowed in a selection", describe(&other)),
                ));
            }
        };

        if values.insert(name.clone(), value).is_some() {
            return Err(ConditionParseError::new(
                input,
                format!("variant `{}` given twice", name),
            ));
        }
    }

    request.selection = Selection { values };
    Ok(request)
}

fn describe(token: &Token) -> String {
    match token {
        Token::Dependency(name) => format!("^{}", name),
        Token::Name(name) => name.clone(),
        Token::Not => "!".to_string(),
        Token::Or => "|".to_string(),
        Token::Open => "(".to_string(),
        Token::Close => ")".to_string(),
        _ => "token".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flags() {
        let req = parse_spec("+python~tui+mpi").unwrap();
        assert_eq!(req.selection.len(), 3);
        assert!(req.selection.is_enabled("python"));
        assert_eq!(req.selection.get("tui"), Some(&VariantValue::Bool(false)));
        assert!(req.version.is_none());
    }

    #[test]
    fn test_parse_version_compiler_and_values() {
        let req = parse_spec("@2024.2 %gcc@12.2 +rocm amdgpu_target=gfx90a,gfx1030 build_type=Debug")
            .unwrap();
        assert_eq!(req.version.as_deref(), Some("2024.2"));
        assert_eq!(req.compiler, Some(CompilerId::new("gcc", Some("12.2"))));
        assert_eq!(
            req.selection.get("amdgpu_target"),
            Some(&VariantValue::Multi(
                ["gfx1030".to_string(), "gfx90a".to_string()].into()
            ))
        );
        assert_eq!(
            req.selection.get("build_type"),
            Some(&VariantValue::Single("Debug".to_string()))
        );
    }

    #[test]
    fn test_parse_rejects_duplicates_and_operators() {
        assert!(parse_spec("+python~python").is_err());
        assert!(parse_spec("@1 @2").is_err());
        assert!(parse_spec("+a | +b").is_err());
        assert!(parse_spec("^hip").is_err());
        assert!(parse_spec("python").is_err());
    }

    #[test]
    fn test_display() {
        let s = Selection::new()
            .with("python", true)
            .with("tui", false)
            .with("build_type", "Release");
        assert_eq!(s.to_string(), "+python~tui build_type=Release");
        assert_eq!(Selection::new().to_string(), "");
    }
}
