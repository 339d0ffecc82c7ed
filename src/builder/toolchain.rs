//! Compiler strategy selection.
//!
//! A descriptor lists toolchain rules; once the dependency set is known, the first
//! rule whose condition holds and whose dependency is present is selected. Its
//! compilers, found under that dependency's install prefix, are appended as the
//! final arguments. Without a match the host compiler is used and nothing is added.

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::builder::RuleError;
use crate::core::argument::ArgumentValue;
use crate::core::condition::{Condition, EvalContext};
use crate::core::template::TemplateError;

/// A compiler swap keyed on a condition and a dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainRule {
    pub id: String,
    pub condition: Condition,
    pub dependency: String,
    /// C compiler, relative to the dependency prefix
    pub cc: Option<String>,
    /// C++ compiler, relative to the dependency prefix
    pub cxx: Option<String>,
}

impl ToolchainRule {
    pub fn new(dependency: impl Into<String>) -> Self {
        let dependency = dependency.into();
        ToolchainRule {
            id: dependency.clone(),
            condition: Condition::Always,
            dependency,
            cc: None,
            cxx: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_cc(mut self, path: impl Into<String>) -> Self {
        self.cc = Some(path.into());
        self
    }

    pub fn with_cxx(mut self, path: impl Into<String>) -> Self {
        self.cxx = Some(path.into());
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = self.condition.and(condition);
        self
    }
}

/// How compilers are chosen for a resolution.
pub trait CompilerStrategy: Send + Sync {
    /// Identifier reported in the resolution.
    fn id(&self) -> &str;

    /// Arguments appended after every rule-driven argument.
    fn arguments(&self, prefixes: &BTreeMap<String, PathBuf>) -> Result<Vec<(String, ArgumentValue)>, RuleError>;
}

/// The compiler the build system finds on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostCompiler;

impl CompilerStrategy for HostCompiler {
    fn id(&self) -> &str {
        "host"
    }

    fn arguments(&self, _prefixes: &BTreeMap<String, PathBuf>) -> Result<Vec<(String, ArgumentValue)>, RuleError> {
        Ok(Vec::new())
    }
}

/// Compilers shipped inside a dependency's install prefix.
#[derive(Debug, Clone)]
pub struct PrefixCompiler<'a> {
    rule: &'a ToolchainRule,
}

impl<'a> PrefixCompiler<'a> {
    pub fn new(rule: &'a ToolchainRule) -> Self {
        PrefixCompiler { rule }
    }
}

impl CompilerStrategy for PrefixCompiler<'_> {
    fn id(&self) -> &str {
        &self.rule.id
    }

    fn arguments(&self, prefixes: &BTreeMap<String, PathBuf>) -> Result<Vec<(String, ArgumentValue)>, RuleError> {
        let prefix = prefixes.get(&self.rule.dependency).ok_or_else(|| {
            RuleError::new(
                format!("toolchain `{}`", self.rule.id),
                TemplateError::UnresolvedPrefix {
                    name: self.rule.dependency.clone(),
                },
            )
        })?;

        let mut args = Vec::new();
        if let Some(cc) = &self.rule.cc {
            args.push((
                "CMAKE_C_COMPILER".to_string(),
                ArgumentValue::Path(prefix.join(cc).display().to_string()),
            ));
        }
        if let Some(cxx) = &self.rule.cxx {
            args.push((
                "CMAKE_CXX_COMPILER".to_string(),
                ArgumentValue::Path(prefix.join(cxx).display().to_string()),
            ));
        }
        Ok(args)
    }
}

/// Select the strategy for a resolution. `ctx` must carry the dependency set.
pub fn select_strategy<'a>(rules: &'a [ToolchainRule], ctx: &EvalContext<'_>) -> Box<dyn CompilerStrategy + 'a> {
    let has_dependency = |name: &str| ctx.dependencies.is_some_and(|deps| deps.has_dependency(name));

    for rule in rules {
        if rule.condition.evaluate_in(ctx) && has_dependency(&rule.dependency) {
            tracing::debug!(toolchain = %rule.id, "selected toolchain");
            return Box::new(PrefixCompiler::new(rule));
        }
    }
    Box::new(HostCompiler)
}
