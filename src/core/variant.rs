//! Variants: named, typed build options, and the space they are declared in.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::condition::{Condition, Truth};
use crate::core::facts::Facts;
use crate::core::selection::Selection;

/// Sentinel value for multi-valued variants meaning "nothing selected".
pub const NONE_VALUE: &str = "none";

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9][a-z0-9_-]*$").expect("name pattern is valid")
});

/// Check that a variant or package name is well formed.
pub fn is_valid_name(name: &str) -> bool {
    NAME_RE.is_match(name)
}

/// The type of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariantKind {
    Bool,
    Enum,
    #[serde(rename = "multi")]
    MultiEnum,
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantKind::Bool => write!(f, "bool"),
            VariantKind::Enum => write!(f, "enum"),
            VariantKind::MultiEnum => write!(f, "multi"),
        }
    }
}

/// A variant value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VariantValue {
    Bool(bool),
    Single(String),
    Multi(BTreeSet<String>),
}

impl VariantValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            VariantValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The individual values, sorted. Booleans yield `true`/`false`.
    pub fn values(&self) -> Vec<String> {
        match self {
            VariantValue::Bool(b) => vec![b.to_string()],
            VariantValue::Single(s) => vec![s.clone()],
            VariantValue::Multi(set) => set.iter().cloned().collect(),
        }
    }
}

impl fmt::Display for VariantValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VariantValue::Bool(b) => write!(f, "{}", b),
            VariantValue::Single(s) => f.write_str(s),
            VariantValue::Multi(set) => {
                let joined: Vec<&str> = set.iter().map(String::as_str).collect();
                f.write_str(&joined.join(","))
            }
        }
    }
}

impl From<bool> for VariantValue {
    fn from(b: bool) -> Self {
        VariantValue::Bool(b)
    }
}

impl From<&str> for VariantValue {
    fn from(s: &str) -> Self {
        VariantValue::Single(s.to_string())
    }
}

impl From<String> for VariantValue {
    fn from(s: String) -> Self {
        VariantValue::Single(s)
    }
}

impl From<Vec<&str>> for VariantValue {
    fn from(values: Vec<&str>) -> Self {
        VariantValue::Multi(values.into_iter().map(str::to_string).collect())
    }
}

/// Errors raised while declaring variants or validating a selection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VariantError {
    #[error("variant `{name}` is declared twice")]
    Duplicate { name: String },

    #[error("variant `{name}` has an invalid name")]
    InvalidName { name: String },

    #[error("variant `{name}` is only declared when `{condition}`, which refers to undeclared variant `{reference}`")]
    Undeclared {
        name: String,
        condition: String,
        reference: String,
    },

    #[error("variant `{name}` can never be active: `{condition}` is unsatisfiable")]
    Dead { name: String, condition: String },

    #[error("unknown variant `{name}`")]
    Unknown { name: String, known: Vec<String> },

    #[error("illegal value `{value}` for variant `{name}` (expected {expected})")]
    IllegalValue {
        name: String,
        value: String,
        expected: String,
    },

    #[error("variant `{name}` cannot be set: it only exists when `{condition}`")]
    Inactive { name: String, condition: String },

    /// Reported with the selection errors, since both come from the request.
    #[error("unknown version `{version}`")]
    UnknownVersion { version: String, known: Vec<String> },
}

/// All selection errors found in one validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.render())]
pub struct ValidationErrors(pub Vec<VariantError>);

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &VariantError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn render(&self) -> String {
        let msgs: Vec<String> = self.0.iter().map(|e| e.to_string()).collect();
        msgs.join("; ")
    }
}

/// A named, typed build option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Variant {
    pub name: String,
    pub kind: VariantKind,
    pub default: VariantValue,
    /// Legal values for `Enum` and `MultiEnum` kinds
    pub values: Vec<String>,
    pub description: String,
    /// The variant only exists when this holds
    #[serde(rename = "when")]
    pub condition: Condition,
}

impl Variant {
    /// A boolean variant.
    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Variant {
            name: name.into(),
            kind: VariantKind::Bool,
            default: VariantValue::Bool(default),
            values: Vec::new(),
            description: String::new(),
            condition: Condition::Always,
        }
    }

    /// A single-valued enumerated variant.
    pub fn single<I, S>(name: impl Into<String>, values: I, default: &str) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Variant {
            name: name.into(),
            kind: VariantKind::Enum,
            default: VariantValue::Single(default.to_string()),
            values: values.into_iter().map(Into::into).collect(),
            description: String::new(),
            condition: Condition::Always,
        }
    }

    /// A multi-valued enumerated variant.
    pub fn multi<I, S>(name: impl Into<String>, values: I, default: &[&str]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Variant {
            name: name.into(),
            kind: VariantKind::MultiEnum,
            default: VariantValue::Multi(default.iter().map(|s| s.to_string()).collect()),
            values: values.into_iter().map(Into::into).collect(),
            description: String::new(),
            condition: Condition::Always,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Only declare this variant when `condition` holds.
    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Bring a requested value into this variant's kind, or explain why it is illegal.
    pub fn coerce(&self, value: &VariantValue) -> Result<VariantValue, VariantError> {
        let illegal = |expected: String| VariantError::IllegalValue {
            name: self.name.clone(),
            value: value.to_string(),
            expected,
        };

        match (self.kind, value) {
            (VariantKind::Bool, VariantValue::Bool(b)) => Ok(VariantValue::Bool(*b)),
            (VariantKind::Bool, VariantValue::Single(s)) => match s.as_str() {
                "true" | "True" | "on" => Ok(VariantValue::Bool(true)),
                "false" | "False" | "off" => Ok(VariantValue::Bool(false)),
                _ => Err(illegal("a boolean".to_string())),
            },
            (VariantKind::Bool, VariantValue::Multi(_)) => Err(illegal("a boolean".to_string())),

            (VariantKind::Enum, VariantValue::Single(s)) if self.values.contains(s) => {
                Ok(VariantValue::Single(s.clone()))
            }
            (VariantKind::Enum, _) => Err(illegal(self.expected_values())),

            (VariantKind::MultiEnum, VariantValue::Bool(_)) => {
                Err(illegal(self.expected_values()))
            }
            (VariantKind::MultiEnum, VariantValue::Single(s)) => {
                self.check_multi(&BTreeSet::from([s.clone()]), illegal)
            }
            (VariantKind::MultiEnum, VariantValue::Multi(set)) => self.check_multi(set, illegal),
        }
    }

    fn check_multi(
        &self,
        set: &BTreeSet<String>,
        illegal: impl Fn(String) -> VariantError,
    ) -> Result<VariantValue, VariantError> {
        if set.is_empty() || set.iter().any(|v| !self.values.contains(v)) {
            return Err(illegal(self.expected_values()));
        }
        if set.len() > 1 && set.contains(NONE_VALUE) {
            return Err(illegal(format!("`{}` alone or other values", NONE_VALUE)));
        }
        Ok(VariantValue::Multi(set.clone()))
    }

    fn expected_values(&self) -> String {
        let kind = if self.kind == VariantKind::MultiEnum {
            "any of"
        } else {
            "one of"
        };
        format!("{} {}", kind, self.values.join(", "))
    }

    /// Candidate values used to decide whether a condition on this variant can ever hold.
    fn sample_values(&self) -> Vec<VariantValue> {
        match self.kind {
            VariantKind::Bool => vec![VariantValue::Bool(true), VariantValue::Bool(false)],
            VariantKind::Enum => self
                .values
                .iter()
                .map(|v| VariantValue::Single(v.clone()))
                .collect(),
            VariantKind::MultiEnum => {
                let mut samples: Vec<VariantValue> = self
                    .values
                    .iter()
                    .map(|v| VariantValue::Multi(BTreeSet::from([v.clone()])))
                    .collect();
                let all: BTreeSet<String> = self
                    .values
                    .iter()
                    .filter(|v| *v != NONE_VALUE)
                    .cloned()
                    .collect();
                if all.len() > 1 {
                    samples.push(VariantValue::Multi(all));
                }
                samples
            }
        }
    }
}

/// The declared option set of a package, in declaration order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct VariantSpace {
    variants: Vec<Variant>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl VariantSpace {
    pub fn new() -> Self {
        VariantSpace::default()
    }

    /// Declare a variant.
    ///
    /// The declaration condition may only refer to variants declared earlier and
    /// must be satisfiable by some combination of their values.
    pub fn declare(&mut self, variant: Variant) -> Result<(), VariantError> {
        if !is_valid_name(&variant.name) {
            return Err(VariantError::InvalidName { name: variant.name });
        }
        if self.index.contains_key(&variant.name) {
            return Err(VariantError::Duplicate { name: variant.name });
        }
        if variant.kind != VariantKind::Bool {
            variant.coerce(&variant.default)?;
        }

        let referenced: Vec<&str> = variant.condition.referenced_variants().into_iter().collect();
        for reference in &referenced {
            if !self.index.contains_key(*reference) {
                return Err(VariantError::Undeclared {
                    name: variant.name.clone(),
                    condition: variant.condition.to_string(),
                    reference: reference.to_string(),
                });
            }
        }

        if !self.satisfiable(&variant.condition) {
            return Err(VariantError::Dead {
                name: variant.name.clone(),
                condition: variant.condition.to_string(),
            });
        }

        tracing::debug!(variant = %variant.name, kind = %variant.kind, "declared variant");
        self.index.insert(variant.name.clone(), self.variants.len());
        self.variants.push(variant);
        Ok(())
    }

    /// Try every combination of sample values for the referenced variants and the
    /// variants their own declarations depend on. A variant whose declaration is
    /// false under the values chosen before it is left out of that assignment.
    /// Atoms on facts are unknown here, so they never make a condition dead.
    fn satisfiable(&self, condition: &Condition) -> bool {
        let samples: Vec<(&Variant, Vec<VariantValue>)> = self
            .closure(condition)
            .into_iter()
            .map(|v| (v, v.sample_values()))
            .collect();

        let mut counters = vec![0usize; samples.len()];
        loop {
            let mut assigned: Vec<(String, VariantValue)> = Vec::with_capacity(samples.len());
            for ((variant, values), &i) in samples.iter().zip(&counters) {
                let partial: Selection = assigned.iter().cloned().collect();
                if variant.condition.truth(&partial) != Truth::False {
                    assigned.push((variant.name.clone(), values[i].clone()));
                }
            }
            let assignment: Selection = assigned.into_iter().collect();
            if condition.truth(&assignment).possible() {
                return true;
            }

            // Advance the odometer
            let mut pos = 0;
            loop {
                if pos == counters.len() {
                    return false;
                }
                counters[pos] += 1;
                if counters[pos] < samples[pos].1.len() {
                    break;
                }
                counters[pos] = 0;
                pos += 1;
            }
        }
    }

    /// Declared variants `condition` depends on, directly or through their own
    /// declaration conditions, in declaration order.
    fn closure(&self, condition: &Condition) -> Vec<&Variant> {
        let mut seen: BTreeSet<usize> = BTreeSet::new();
        let mut pending: Vec<&str> = condition.referenced_variants().into_iter().collect();
        while let Some(name) = pending.pop() {
            if let Some(&i) = self.index.get(name) {
                if seen.insert(i) {
                    pending.extend(self.variants[i].condition.referenced_variants());
                }
            }
        }
        seen.into_iter().map(|i| &self.variants[i]).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.index.get(name).map(|&i| &self.variants[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    /// Validate a candidate selection and fill in defaults.
    ///
    /// Variants are visited in declaration order; each declaration condition is
    /// evaluated against the values settled so far. An inactive variant has no
    /// value in the result, and setting one explicitly is an error. Every problem
    /// found is reported, not just the first.
    pub fn validate(&self, selection: &Selection, facts: &Facts) -> Result<Selection, ValidationErrors> {
        let mut errors = Vec::new();

        for (name, _) in selection {
            if !self.contains(name) {
                errors.push(VariantError::Unknown {
                    name: name.clone(),
                    known: self.variants.iter().map(|v| v.name.clone()).collect(),
                });
            }
        }

        let mut settled: BTreeMap<String, VariantValue> = BTreeMap::new();
        for variant in &self.variants {
            let partial: Selection = settled.clone().into_iter().collect();
            let active = variant.condition.evaluate(&partial, facts);
            let requested = selection.get(&variant.name);

            match (active, requested) {
                (true, Some(value)) => match variant.coerce(value) {
                    Ok(v) => {
                        settled.insert(variant.name.clone(), v);
                    }
                    Err(e) => {
                        errors.push(e);
                        settled.insert(variant.name.clone(), variant.default.clone());
                    }
                },
                (true, None) => {
                    settled.insert(variant.name.clone(), variant.default.clone());
                }
                (false, Some(_)) => errors.push(VariantError::Inactive {
                    name: variant.name.clone(),
                    condition: variant.condition.to_string(),
                }),
                (false, None) => {
                    tracing::debug!(variant = %variant.name, "variant inactive, left unset");
                }
            }
        }

        if errors.is_empty() {
            Ok(settled.into_iter().collect())
        } else {
            Err(ValidationErrors(errors))
        }
    }
}
