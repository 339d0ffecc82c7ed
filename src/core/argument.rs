//! Build-system argument rules.

use std::fmt;

use glob::Pattern;
use serde::Serialize;

use crate::core::condition::Condition;
use crate::core::template::Template;

/// A synthesized argument value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ArgumentValue {
    Bool(bool),
    String(String),
    List(Vec<String>),
    Path(String),
}

impl fmt::Display for ArgumentValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgumentValue::Bool(true) => f.write_str("ON"),
            ArgumentValue::Bool(false) => f.write_str("OFF"),
            ArgumentValue::String(s) | ArgumentValue::Path(s) => f.write_str(s),
            ArgumentValue::List(items) => f.write_str(&items.join(";")),
        }
    }
}

impl From<bool> for ArgumentValue {
    fn from(b: bool) -> Self {
        ArgumentValue::Bool(b)
    }
}

impl From<&str> for ArgumentValue {
    fn from(s: &str) -> Self {
        ArgumentValue::String(s.to_string())
    }
}

/// Combine the values of one or more variants matching a pattern into one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub variants: Vec<String>,
    pub pattern: Pattern,
    pub separator: String,
}

impl Fold {
    pub fn new(variants: impl IntoIterator<Item = impl Into<String>>, pattern: Pattern) -> Self {
        Fold {
            variants: variants.into_iter().map(Into::into).collect(),
            pattern,
            separator: ";".to_string(),
        }
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }
}

/// How an argument's value is computed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgumentExpr {
    Literal(ArgumentValue),
    /// The value of a variant: booleans stay booleans, multi-valued variants become lists
    Variant(String),
    /// Whether a condition holds
    Condition(Condition),
    Fold(Fold),
    Path(Template),
}

/// One `KEY=value` produced for the build system when its condition holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentRule {
    pub key: String,
    pub expr: ArgumentExpr,
    pub condition: Condition,
}

impl ArgumentRule {
    pub fn new(key: impl Into<String>, expr: ArgumentExpr) -> Self {
        ArgumentRule {
            key: key.into(),
            expr,
            condition: Condition::Always,
        }
    }

    /// `KEY` follows a variant.
    pub fn from_variant(key: impl Into<String>, variant: impl Into<String>) -> Self {
        ArgumentRule::new(key, ArgumentExpr::Variant(variant.into()))
    }

    /// `KEY` is ON when `condition` holds.
    pub fn from_condition(key: impl Into<String>, condition: Condition) -> Self {
        ArgumentRule::new(key, ArgumentExpr::Condition(condition))
    }

    pub fn literal(key: impl Into<String>, value: impl Into<ArgumentValue>) -> Self {
        ArgumentRule::new(key, ArgumentExpr::Literal(value.into()))
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = self.condition.and(condition);
        self
    }
}
