//! Argument synthesis: rules in declaration order into an ordered key/value map.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::builder::RuleError;
use crate::core::argument::{ArgumentExpr, ArgumentRule, ArgumentValue, Fold};
use crate::core::condition::EvalContext;
use crate::core::template::TemplateContext;
use crate::core::variant::VariantValue;

/// Synthesized arguments. Keys keep the position of their first insertion and
/// the value of their last.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Arguments {
    entries: IndexMap<String, ArgumentValue>,
}

impl Arguments {
    pub fn new() -> Self {
        Arguments::default()
    }

    /// Insert or overwrite `key`. Returns the replaced value, if any.
    pub fn insert(&mut self, key: impl Into<String>, value: ArgumentValue) -> Option<ArgumentValue> {
        self.entries.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&ArgumentValue> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgumentValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluates argument rules against a resolved selection and dependency set.
pub struct ArgumentSynthesizer<'a> {
    templates: &'a TemplateContext<'a>,
}

impl<'a> ArgumentSynthesizer<'a> {
    pub fn new(templates: &'a TemplateContext<'a>) -> Self {
        ArgumentSynthesizer { templates }
    }

    /// Apply every rule whose condition holds, in order.
    pub fn synthesize(&self, ctx: &EvalContext<'_>, rules: &[ArgumentRule]) -> Result<Arguments, RuleError> {
        let mut args = Arguments::new();
        for rule in rules {
            if !rule.condition.evaluate_in(ctx) {
                continue;
            }
            let Some(value) = self.value(ctx, rule)? else {
                tracing::debug!(key = %rule.key, "argument has no value, skipped");
                continue;
            };
            if let Some(previous) = args.insert(rule.key.clone(), value) {
                tracing::debug!(key = %rule.key, %previous, "argument overwritten");
            }
        }
        Ok(args)
    }

    fn value(&self, ctx: &EvalContext<'_>, rule: &ArgumentRule) -> Result<Option<ArgumentValue>, RuleError> {
        let value = match &rule.expr {
            ArgumentExpr::Literal(v) => Some(v.clone()),
            ArgumentExpr::Variant(name) => ctx.selection.get(name).map(|value| match value {
                VariantValue::Bool(b) => ArgumentValue::Bool(*b),
                VariantValue::Single(s) => ArgumentValue::String(s.clone()),
                VariantValue::Multi(set) => ArgumentValue::List(set.iter().cloned().collect()),
            }),
            ArgumentExpr::Condition(condition) => Some(ArgumentValue::Bool(condition.evaluate_in(ctx))),
            ArgumentExpr::Fold(fold) => fold_values(ctx, fold),
            ArgumentExpr::Path(template) => {
                let path = template
                    .render(self.templates)
                    .map_err(|source| RuleError::new(format!("argument `{}`", rule.key), source))?;
                Some(ArgumentValue::Path(path))
            }
        };
        Ok(value)
    }
}

/// Sorted, de-duplicated values of the fold's variants that match its pattern,
/// joined into one string. Nothing matching means no argument.
fn fold_values(ctx: &EvalContext<'_>, fold: &Fold) -> Option<ArgumentValue> {
    let matched: BTreeSet<String> = fold
        .variants
        .iter()
        .filter_map(|name| ctx.selection.get(name))
        .flat_map(|value| value.values())
        .filter(|v| fold.pattern.matches(v))
        .collect();

    if matched.is_empty() {
        return None;
    }
    let joined: Vec<&str> = matched.iter().map(String::as_str).collect();
    Some(ArgumentValue::String(joined.join(&fold.separator)))
}
