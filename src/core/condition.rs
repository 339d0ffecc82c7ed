//! Conditions: pure boolean predicates over a selection and static facts.
//!
//! Conditions are written in the compact spec syntax package authors already use:
//!
//! ```text
//! +rocm~vtkm            variant rocm enabled and vtkm disabled
//! amdgpu_target=gfx90a  multi-valued variant contains gfx90a
//! @2.1:                 package version at least 2.1
//! %gcc@:4.99            compiler is gcc up to 4.99.x
//! platform=darwin       platform fact
//! ^hip                  hip is in the derived dependency set
//! !^hip                 negation
//! +cuda | +rocm         alternatives
//! ```
//!
//! Terms next to each other are ANDed. Evaluation is total: a missing variant,
//! version or compiler makes the atom false instead of raising.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::facts::Facts;
use crate::core::selection::Selection;
use crate::core::variant::VariantValue;
use crate::core::version::VersionRange;

/// Error produced when a condition or spec string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid spec `{input}`: {message}")]
pub struct ConditionParseError {
    pub input: String,
    pub message: String,
}

impl ConditionParseError {
    pub fn new(input: impl Into<String>, message: impl Into<String>) -> Self {
        ConditionParseError {
            input: input.into(),
            message: message.into(),
        }
    }
}

/// Which platform fact an atom tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformKey {
    Platform,
    Os,
    Arch,
}

impl PlatformKey {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "platform" => Some(PlatformKey::Platform),
            "os" => Some(PlatformKey::Os),
            "target" | "arch" => Some(PlatformKey::Arch),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            PlatformKey::Platform => "platform",
            PlatformKey::Os => "os",
            PlatformKey::Arch => "target",
        }
    }

    fn fact<'a>(&self, facts: &'a Facts) -> &'a str {
        match self {
            PlatformKey::Platform => &facts.platform,
            PlatformKey::Os => &facts.os,
            PlatformKey::Arch => &facts.arch,
        }
    }
}

/// Test applied to a single variant's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantTest {
    /// `+name` / `~name`
    Enabled(bool),
    /// `name=a,b`: an enum equal to any listed value, or a multi-valued
    /// variant containing all of them.
    Values(Vec<String>),
}

impl VariantTest {
    fn matches(&self, value: &VariantValue) -> bool {
        match (self, value) {
            (VariantTest::Enabled(want), VariantValue::Bool(have)) => want == have,
            (VariantTest::Enabled(_), _) => false,
            (VariantTest::Values(vals), VariantValue::Bool(have)) => {
                vals.len() == 1 && vals[0].parse::<bool>().ok() == Some(*have)
            }
            (VariantTest::Values(vals), VariantValue::Single(have)) => vals.iter().any(|v| v == have),
            (VariantTest::Values(vals), VariantValue::Multi(have)) => {
                vals.iter().all(|v| have.contains(v))
            }
        }
    }
}

/// Lookup of the dependency set derived for a resolution.
pub trait DependencyLookup {
    fn has_dependency(&self, name: &str) -> bool;
}

impl DependencyLookup for BTreeSet<String> {
    fn has_dependency(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Everything a condition may look at.
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    pub selection: &'a Selection,
    pub facts: &'a Facts,
    pub dependencies: Option<&'a dyn DependencyLookup>,
}

impl<'a> EvalContext<'a> {
    pub fn new(selection: &'a Selection, facts: &'a Facts) -> Self {
        EvalContext {
            selection,
            facts,
            dependencies: None,
        }
    }

    /// Attach the derived dependency set, enabling `^name` atoms.
    pub fn with_dependencies(mut self, dependencies: &'a dyn DependencyLookup) -> Self {
        self.dependencies = Some(dependencies);
        self
    }
}

/// Kleene three-valued truth, used where some facts are not known yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    fn from_bool(b: bool) -> Self {
        if b {
            Truth::True
        } else {
            Truth::False
        }
    }

    fn not(self) -> Self {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Unknown => Truth::Unknown,
        }
    }

    /// Could this be true once the unknown facts are filled in?
    pub fn possible(self) -> bool {
        self != Truth::False
    }
}

/// A boolean expression tree over variants, versions, compiler, platform and dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Condition {
    #[default]
    Always,
    Variant { name: String, test: VariantTest },
    Version(VersionRange),
    Compiler { name: String, range: Option<VersionRange> },
    Platform { key: PlatformKey, value: String },
    Dependency(String),
    Not(Box<Condition>),
    All(Vec<Condition>),
    Any(Vec<Condition>),
}

impl Condition {
    /// `+name`
    pub fn enabled(name: impl Into<String>) -> Self {
        Condition::Variant {
            name: name.into(),
            test: VariantTest::Enabled(true),
        }
    }

    /// `~name`
    pub fn disabled(name: impl Into<String>) -> Self {
        Condition::Variant {
            name: name.into(),
            test: VariantTest::Enabled(false),
        }
    }

    /// `name=value`
    pub fn equals(name: impl Into<String>, value: impl Into<String>) -> Self {
        Condition::Variant {
            name: name.into(),
            test: VariantTest::Values(vec![value.into()]),
        }
    }

    /// `^name`
    pub fn dependency(name: impl Into<String>) -> Self {
        Condition::Dependency(name.into())
    }

    /// Negate a condition.
    pub fn negate(self) -> Self {
        match self {
            Condition::Not(inner) => *inner,
            other => Condition::Not(Box::new(other)),
        }
    }

    /// Conjunction of several conditions, dropping `Always` and flattening nested `All`s.
    pub fn all(conditions: impl IntoIterator<Item = Condition>) -> Self {
        let mut flat = Vec::new();
        for c in conditions {
            match c {
                Condition::Always => {}
                Condition::All(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Condition::Always,
            1 => flat.remove(0),
            _ => Condition::All(flat),
        }
    }

    /// Conjoin with another condition.
    pub fn and(self, other: Condition) -> Self {
        Condition::all([self, other])
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Condition::Always)
    }

    /// Evaluate against a selection and static facts.
    pub fn evaluate(&self, selection: &Selection, facts: &Facts) -> bool {
        self.evaluate_in(&EvalContext::new(selection, facts))
    }

    /// Evaluate against a full context, including the dependency set if present.
    /// Dependency atoms are false while no dependency set is attached.
    pub fn evaluate_in(&self, ctx: &EvalContext<'_>) -> bool {
        match self {
            Condition::Always => true,
            Condition::Variant { name, test } => ctx
                .selection
                .get(name)
                .is_some_and(|value| test.matches(value)),
            Condition::Version(range) => {
                ctx.facts.version.as_ref().is_some_and(|v| range.contains(v))
            }
            Condition::Compiler { name, range } => match &ctx.facts.compiler {
                Some(compiler) if compiler.name == *name => match range {
                    None => true,
                    Some(range) => compiler.version.as_ref().is_some_and(|v| range.contains(v)),
                },
                _ => false,
            },
            Condition::Platform { key, value } => key.fact(ctx.facts) == value,
            Condition::Dependency(name) => ctx
                .dependencies
                .is_some_and(|deps| deps.has_dependency(name)),
            Condition::Not(inner) => !inner.evaluate_in(ctx),
            Condition::All(cs) => cs.iter().all(|c| c.evaluate_in(ctx)),
            Condition::Any(cs) => cs.iter().any(|c| c.evaluate_in(ctx)),
        }
    }

    /// Evaluate variant atoms against `selection`, treating every other atom as unknown.
    pub fn truth(&self, selection: &Selection) -> Truth {
        match self {
            Condition::Always => Truth::True,
            Condition::Variant { name, test } => {
                Truth::from_bool(selection.get(name).is_some_and(|v| test.matches(v)))
            }
            Condition::Version(_)
            | Condition::Compiler { .. }
            | Condition::Platform { .. }
            | Condition::Dependency(_) => Truth::Unknown,
            Condition::Not(inner) => inner.truth(selection).not(),
            Condition::All(cs) => {
                let mut result = Truth::True;
                for c in cs {
                    match c.truth(selection) {
                        Truth::False => return Truth::False,
                        Truth::Unknown => result = Truth::Unknown,
                        Truth::True => {}
                    }
                }
                result
            }
            Condition::Any(cs) => {
                let mut result = Truth::False;
                for c in cs {
                    match c.truth(selection) {
                        Truth::True => return Truth::True,
                        Truth::Unknown => result = Truth::Unknown,
                        Truth::False => {}
                    }
                }
                result
            }
        }
    }

    /// Names of all variants this condition tests.
    pub fn referenced_variants(&self) -> BTreeSet<&str> {
        let mut out = BTreeSet::new();
        self.collect_variants(&mut out);
        out
    }

    fn collect_variants<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Condition::Variant { name, .. } => {
                out.insert(name.as_str());
            }
            Condition::Not(inner) => inner.collect_variants(out),
            Condition::All(cs) | Condition::Any(cs) => {
                for c in cs {
                    c.collect_variants(out);
                }
            }
            _ => {}
        }
    }

    fn is_atom(&self) -> bool {
        !matches!(self, Condition::All(_) | Condition::Any(_))
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Always => Ok(()),
            Condition::Variant { name, test } => match test {
                VariantTest::Enabled(true) => write!(f, "+{}", name),
                VariantTest::Enabled(false) => write!(f, "~{}", name),
                VariantTest::Values(vals) => write!(f, "{}={}", name, vals.join(",")),
            },
            Condition::Version(range) => write!(f, "@{}", range),
            Condition::Compiler { name, range } => match range {
                Some(r) => write!(f, "%{}@{}", name, r),
                None => write!(f, "%{}", name),
            },
            Condition::Platform { key, value } => write!(f, "{}={}", key.as_str(), value),
            Condition::Dependency(name) => write!(f, "^{}", name),
            Condition::Not(inner) if inner.is_atom() => write!(f, "!{}", inner),
            Condition::Not(inner) => write!(f, "!({})", inner),
            Condition::All(cs) => {
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    if matches!(c, Condition::Any(_)) {
                        write!(f, "({})", c)?;
                    } else {
                        write!(f, "{}", c)?;
                    }
                }
                Ok(())
            }
            Condition::Any(cs) => {
                for (i, c) in cs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    write!(f, "{}", c)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Condition {
    type Err = ConditionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        let mut parser = Parser {
            input: s,
            tokens: &tokens,
            pos: 0,
        };
        let condition = parser.alternatives()?;
        if parser.pos < tokens.len() {
            return Err(ConditionParseError::new(s, "unbalanced `)`"));
        }
        Ok(condition)
    }
}

impl TryFrom<String> for Condition {
    type Error = ConditionParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Condition> for String {
    fn from(c: Condition) -> Self {
        c.to_string()
    }
}

/// Lexical unit of the spec syntax.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Enable(String),
    Disable(String),
    Assign(String, Vec<String>),
    Version(String),
    Compiler(String, Option<String>),
    Dependency(String),
    Name(String),
    Not,
    Or,
    Open,
    Close,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '{' | '}' | ':')
}

fn is_range_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | ':' | ',')
}

/// Split a spec string into tokens.
pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, ConditionParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let take = |i: &mut usize, pred: fn(char) -> bool| -> String {
        let start = *i;
        while *i < chars.len() && pred(chars[*i]) {
            *i += 1;
        }
        chars[start..*i].iter().collect()
    };

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '+' | '~' | '^' => {
                i += 1;
                let name = take(&mut i, is_name_char);
                if name.is_empty() {
                    return Err(ConditionParseError::new(
                        input,
                        format!("expected a name after `{}`", c),
                    ));
                }
                tokens.push(match c {
                    '+' => Token::Enable(name),
                    '~' => Token::Disable(name),
                    _ => Token::Dependency(name),
                });
            }
            '@' => {
                i += 1;
                let range = take(&mut i, is_range_char);
                if range.is_empty() {
                    return Err(ConditionParseError::new(input, "expected a version after `@`"));
                }
                tokens.push(Token::Version(range));
            }
            '%' => {
                i += 1;
                let name = take(&mut i, is_name_char);
                if name.is_empty() {
                    return Err(ConditionParseError::new(input, "expected a compiler after `%`"));
                }
                let range = if i < chars.len() && chars[i] == '@' {
                    i += 1;
                    let r = take(&mut i, is_range_char);
                    if r.is_empty() {
                        return Err(ConditionParseError::new(
                            input,
                            "expected a version after `@`",
                        ));
                    }
                    Some(r)
                } else {
                    None
                };
                tokens.push(Token::Compiler(name, range));
            }
            '!' => {
                i += 1;
                tokens.push(Token::Not);
            }
            '|' => {
                i += 1;
                tokens.push(Token::Or);
            }
            '(' => {
                i += 1;
                tokens.push(Token::Open);
            }
            ')' => {
                i += 1;
                tokens.push(Token::Close);
            }
            c if is_name_char(c) => {
                let name = take(&mut i, is_name_char);
                if i < chars.len() && chars[i] == '=' {
                    i += 1;
                    let raw = take(&mut i, |c| is_value_char(c) || c == ',');
                    let values: Vec<String> = raw.split(',').map(str::to_string).collect();
                    if values.iter().any(String::is_empty) {
                        return Err(ConditionParseError::new(
                            input,
                            format!("expected a value for `{}`", name),
                        ));
                    }
                    tokens.push(Token::Assign(name, values));
                } else {
                    tokens.push(Token::Name(name));
                }
            }
            other => {
                return Err(ConditionParseError::new(
                    input,
                    format!("unexpected character `{}`", other),
                ));
            }
        }
    }

    Ok(tokens)
}

struct Parser<'a> {
    input: &'a str,
    tokens: &'a [Token],
    pos: usize,
}

impl Parser<'_> {
    fn error(&self, message: impl Into<String>) -> ConditionParseError {
        ConditionParseError::new(self.input, message)
    }

    fn alternatives(&mut self) -> Result<Condition, ConditionParseError> {
        let mut alts = vec![self.conjunction()?];
        while self.tokens.get(self.pos) == Some(&Token::Or) {
            self.pos += 1;
            let alt = self.conjunction()?;
            if alt.is_always() {
                return Err(self.error("empty alternative after `|`"));
            }
            alts.push(alt);
        }
        Ok(if alts.len() == 1 {
            alts.remove(0)
        } else {
            Condition::Any(alts)
        })
    }

    fn conjunction(&mut self) -> Result<Condition, ConditionParseError> {
        let mut terms = Vec::new();
        while let Some(token) = self.tokens.get(self.pos) {
            if matches!(token, Token::Or | Token::Close) {
                break;
            }
            terms.push(self.term()?);
        }
        Ok(Condition::all(terms))
    }

    fn term(&mut self) -> Result<Condition, ConditionParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| self.error("unexpected end of input"))?
            .clone();
        self.pos += 1;

        match token {
            Token::Not => {
                if self.pos >= self.tokens.len() {
                    return Err(self.error("expected a term after `!`"));
                }
                Ok(self.term()?.negate())
            }
            Token::Open => {
                let inner = self.alternatives()?;
                if self.tokens.get(self.pos) != Some(&Token::Close) {
                    return Err(self.error("missing `)`"));
                }
                self.pos += 1;
                Ok(inner)
            }
            Token::Enable(name) => Ok(Condition::enabled(name)),
            Token::Disable(name) => Ok(Condition::disabled(name)),
            Token::Assign(key, values) => match PlatformKey::from_key(&key) {
                Some(pk) => {
                    let mut atoms: Vec<Condition> = values
                        .into_iter()
                        .map(|value| Condition::Platform { key: pk, value })
                        .collect();
                    Ok(if atoms.len() == 1 {
                        atoms.remove(0)
                    } else {
                        Condition::Any(atoms)
                    })
                }
                None => Ok(Condition::Variant {
                    name: key,
                    test: VariantTest::Values(values),
                }),
            },
            Token::Version(range) => Ok(Condition::Version(range.parse()?)),
            Token::Compiler(name, range) => Ok(Condition::Compiler {
                name,
                range: range.map(|r| r.parse()).transpose()?,
            }),
            Token::Dependency(name) => Ok(Condition::Dependency(name)),
            Token::Name(name) => Err(self.error(format!(
                "unexpected name `{}` (use `+{}` or `{}=value`)",
                name, name, name
            ))),
            Token::Or | Token::Close => Err(self.error("unexpected operator")),
        }
    }
}
