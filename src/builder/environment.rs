//! Environment composition for build time and run time.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::builder::RuleError;
use crate::core::condition::EvalContext;
use crate::core::environment::{EnvAction, EnvRule, EnvScope};
use crate::core::template::TemplateContext;

/// Separator for path-list variables.
pub const PATH_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// A concrete environment change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum EnvMutation {
    Set { key: String, value: String },
    Unset { key: String },
    PrependPath { key: String, value: String },
}

impl EnvMutation {
    pub fn key(&self) -> &str {
        match self {
            EnvMutation::Set { key, .. }
            | EnvMutation::Unset { key }
            | EnvMutation::PrependPath { key, .. } => key,
        }
    }

    /// POSIX shell form.
    pub fn to_shell(&self) -> String {
        match self {
            EnvMutation::Set { key, value } => format!("export {}=\"{}\"", key, shell_escape(value)),
            EnvMutation::Unset { key } => format!("unset {}", key),
            EnvMutation::PrependPath { key, value } => format!(
                "export {key}=\"{}${{{key}:+{}${key}}}\"",
                shell_escape(value),
                PATH_SEPARATOR,
                key = key
            ),
        }
    }
}

impl fmt::Display for EnvMutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvMutation::Set { key, value } => write!(f, "set {}={}", key, value),
            EnvMutation::Unset { key } => write!(f, "unset {}", key),
            EnvMutation::PrependPath { key, value } => write!(f, "prepend {}={}", key, value),
        }
    }
}

fn shell_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// An ordered mutation sequence for one scope.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct EnvMutations(Vec<EnvMutation>);

impl EnvMutations {
    pub fn iter(&self) -> impl Iterator<Item = &EnvMutation> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply the mutations, in order, to an environment map.
    pub fn apply(&self, env: &mut BTreeMap<String, String>) {
        for mutation in &self.0 {
            match mutation {
                EnvMutation::Set { key, value } => {
                    env.insert(key.clone(), value.clone());
                }
                EnvMutation::Unset { key } => {
                    env.remove(key);
                }
                EnvMutation::PrependPath { key, value } => {
                    let joined = match env.get(key) {
                        Some(old) if !old.is_empty() => format!("{}{}{}", value, PATH_SEPARATOR, old),
                        _ => value.clone(),
                    };
                    env.insert(key.clone(), joined);
                }
            }
        }
    }

    /// One shell statement per line.
    pub fn to_shell(&self) -> String {
        let mut out = String::new();
        for mutation in &self.0 {
            out.push_str(&mutation.to_shell());
            out.push('\n');
        }
        out
    }
}

/// Evaluates environment rules into build-time and run-time mutation sequences.
///
/// Within a scope every `Unset` comes first, in declaration order, followed by the
/// remaining mutations in declaration order. Prepends applied in that order leave the
/// most recently declared path first. The two scopes never interact.
pub struct EnvironmentComposer<'a> {
    templates: &'a TemplateContext<'a>,
}

impl<'a> EnvironmentComposer<'a> {
    pub fn new(templates: &'a TemplateContext<'a>) -> Self {
        EnvironmentComposer { templates }
    }

    pub fn compose(
        &self,
        ctx: &EvalContext<'_>,
        build: &[EnvRule],
        run: &[EnvRule],
    ) -> Result<(EnvMutations, EnvMutations), RuleError> {
        Ok((
            self.compose_scope(ctx, EnvScope::Build, build)?,
            self.compose_scope(ctx, EnvScope::Run, run)?,
        ))
    }

    fn compose_scope(&self, ctx: &EvalContext<'_>, scope: EnvScope, rules: &[EnvRule]) -> Result<EnvMutations, RuleError> {
        let mut unsets = Vec::new();
        let mut others = Vec::new();

        for rule in rules.iter().filter(|r| r.condition.evaluate_in(ctx)) {
            let render = |template: &crate::core::template::Template| {
                template
                    .render(self.templates)
                    .map_err(|source| RuleError::new(format!("{} environment `{}`", scope, rule.key), source))
            };
            match &rule.action {
                EnvAction::Unset => unsets.push(EnvMutation::Unset { key: rule.key.clone() }),
                EnvAction::Set(value) => others.push(EnvMutation::Set {
                    key: rule.key.clone(),
                    value: render(value)?,
                }),
                EnvAction::PrependPath(value) => others.push(EnvMutation::PrependPath {
                    key: rule.key.clone(),
                    value: render(value)?,
                }),
            }
        }

        tracing::debug!(%scope, unsets = unsets.len(), others = others.len(), "composed environment");
        unsets.extend(others);
        Ok(EnvMutations(unsets))
    }
}
