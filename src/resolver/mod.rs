//! Resolution pipeline.
//!
//! `Validate → BuildDependencies → CheckConflicts → SynthesizeArguments →
//! ComposeEnvironment`, run once per request. Dependency conditions are evaluated
//! between validation and the graph build; that step cannot fail. The first stage
//! that fails stops the pipeline and its error carries everything that stage found;
//! nothing computed by earlier stages is returned.
//!
//! The resolver only reads the descriptor, so one descriptor can serve any number
//! of concurrent requests.

pub mod conflicts;
pub mod errors;
pub mod graph;

pub use conflicts::{ConflictChecker, ConflictViolation};
pub use errors::{ResolveError, Stage};
pub use graph::{DependencyEdge, DependencyGraph, DependencyGraphBuilder};

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::builder::arguments::{ArgumentSynthesizer, Arguments};
use crate::builder::RuleError;
use crate::builder::cmake::cmake_args;
use crate::builder::environment::{EnvMutations, EnvironmentComposer};
use crate::builder::toolchain::select_strategy;
use crate::core::condition::EvalContext;
use crate::core::descriptor::PackageDescriptor;
use crate::core::facts::Facts;
use crate::core::selection::Selection;
use crate::core::template::TemplateContext;
use crate::core::variant::VariantError;
use crate::core::version::PackageVersion;
use crate::util::hash::sha256_str;

/// One resolution request: a candidate selection plus everything else it needs.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub selection: Selection,
    pub version: Option<String>,
    pub facts: Facts,
    /// Install prefixes by package name, including the package's own
    pub prefixes: BTreeMap<String, PathBuf>,
}

impl ResolveRequest {
    pub fn new(selection: Selection) -> Self {
        ResolveRequest {
            selection,
            version: None,
            facts: Facts::host(),
            prefixes: BTreeMap::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_facts(mut self, facts: Facts) -> Self {
        self.facts = facts;
        self
    }

    pub fn with_prefix(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.prefixes.insert(name.into(), path.into());
        self
    }
}

/// Everything derived for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub package: String,
    pub version: Option<PackageVersion>,
    pub selection: Selection,
    pub dependencies: DependencyGraph,
    pub toolchain: String,
    pub arguments: Arguments,
    pub build_env: EnvMutations,
    pub run_env: EnvMutations,
}

impl Resolution {
    /// Arguments as CMake `-D` definitions.
    pub fn cmake_args(&self) -> Vec<String> {
        cmake_args(&self.arguments)
    }

    /// SHA-256 of the canonical JSON form. Equal resolutions give equal fingerprints.
    pub fn fingerprint(&self) -> Result<String, serde_json::Error> {
        Ok(sha256_str(&serde_json::to_string(self)?))
    }
}

/// Runs the pipeline against one descriptor.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    descriptor: &'a PackageDescriptor,
}

impl<'a> Resolver<'a> {
    pub fn new(descriptor: &'a PackageDescriptor) -> Self {
        Resolver { descriptor }
    }

    pub fn descriptor(&self) -> &'a PackageDescriptor {
        self.descriptor
    }

    /// Resolve one request.
    pub fn resolve(&self, request: &ResolveRequest) -> Result<Resolution, ResolveError> {
        let d = self.descriptor;
        let _span = tracing::info_span!("resolve", package = %d.name).entered();

        // Validate
        let (version, selection) = self.validate(request)?;
        let mut facts = request.facts.clone();
        facts.version = version.clone();
        tracing::debug!(selection = %selection, "validated selection");

        // Evaluate dependency conditions
        let ctx = EvalContext::new(&selection, &facts);
        let active = graph::active_declarations(&ctx, &d.dependencies);

        // BuildDependencies
        let graph = DependencyGraphBuilder::new(&d.name).merge(&selection, active)?;

        // CheckConflicts
        let violations = ConflictChecker::check(&selection, &facts, &graph, &d.conflicts);
        if !violations.is_empty() {
            return Err(ResolveError::Conflict {
                package: d.name.clone(),
                violations,
            });
        }

        // SynthesizeArguments
        let ctx = ctx.with_dependencies(&graph);
        let templates = TemplateContext {
            package: &d.name,
            selection: &selection,
            version: version.as_ref(),
            prefixes: &request.prefixes,
        };
        let mut arguments = ArgumentSynthesizer::new(&templates)
            .synthesize(&ctx, &d.arguments)
            .map_err(rule_error(Stage::SynthesizeArguments))?;
        let strategy = select_strategy(&d.toolchains, &ctx);
        for (key, value) in strategy
            .arguments(&request.prefixes)
            .map_err(rule_error(Stage::SynthesizeArguments))?
        {
            arguments.insert(key, value);
        }
        tracing::info!(arguments = arguments.len(), toolchain = strategy.id(), "synthesized arguments");

        // ComposeEnvironment
        let (build_env, run_env) = EnvironmentComposer::new(&templates)
            .compose(&ctx, &d.build_env, &d.run_env)
            .map_err(rule_error(Stage::ComposeEnvironment))?;

        let toolchain = strategy.id().to_string();
        Ok(Resolution {
            package: d.name.clone(),
            version,
            selection,
            dependencies: graph,
            toolchain,
            arguments,
            build_env,
            run_env,
        })
    }

    /// Pick the version and validate the selection, reporting problems with both together.
    fn validate(&self, request: &ResolveRequest) -> Result<(Option<PackageVersion>, Selection), ResolveError> {
        let d = self.descriptor;
        let mut errors = Vec::new();

        let version = match &request.version {
            Some(id) if d.versions.is_empty() => Some(PackageVersion::new(id.as_str())),
            Some(id) => match d.find_version(id) {
                Some(v) => Some(v.clone()),
                None => {
                    errors.push(VariantError::UnknownVersion {
                        version: id.clone(),
                        known: d.versions.iter().map(|v| v.to_string()).collect(),
                    });
                    None
                }
            },
            None => d.default_version().cloned(),
        };

        let mut facts = request.facts.clone();
        facts.version = version.clone();
        let selection = match d.variants.validate(&request.selection, &facts) {
            Ok(selection) => Some(selection),
            Err(e) => {
                errors.extend(e.0);
                None
            }
        };

        match selection {
            Some(selection) if errors.is_empty() => Ok((version, selection)),
            _ => Err(ResolveError::Selection {
                package: d.name.clone(),
                errors,
            }),
        }
    }
}

fn rule_error(stage: Stage) -> impl Fn(RuleError) -> ResolveError {
    move |source| ResolveError::Rule { stage, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    use crate::core::argument::{ArgumentRule, ArgumentValue};
    use crate::core::conflict::ConflictRule;
    use crate::core::descriptor::DescriptorBuilder;
    use crate::core::environment::{EnvRule, EnvScope};
    use crate::core::variant::Variant;

    fn cond(s: &str) -> crate::core::condition::Condition {
        s.parse().unwrap()
    }

    fn descriptor() -> PackageDescriptor {
        let mut b = DescriptorBuilder::new("vistle").unwrap();
        b.version("2024.2").unwrap().version("2025.1").unwrap().version("master").unwrap();
        b.variant(Variant::boolean("python", true)).unwrap();
        b.variant(Variant::boolean("tui", true)).unwrap();
        b.depends_on("python@2.7:", &[]).unwrap();
        b.conflicts(
            ConflictRule::new(cond("+tui"), cond("~python"))
                .with_message("Python is required to interpret user input"),
        );
        b.argument(ArgumentRule::from_variant("VISTLE_USE_PYTHON", "python"));
        b.argument(ArgumentRule::literal("VISTLE_PEDANTIC_ERRORS", false));
        b.env(EnvScope::Run, EnvRule::set("VISTLE_ROOT", "{prefix}".parse().unwrap()));
        b.build().unwrap()
    }

    fn request(selection: Selection) -> ResolveRequest {
        ResolveRequest::new(selection).with_prefix("vistle", "/opt/vistle")
    }

    #[test]
    fn test_end_to_end() {
        let d = descriptor();
        let resolver = Resolver::new(&d);
        let ok = resolver
            .resolve(&request(Selection::new().with("python", true).with("tui", true)))
            .unwrap();
        assert_eq!(ok.version.as_ref().map(|v| v.as_str()), Some("2025.1"));
        assert!(ok.dependencies.contains("python"));
        assert_eq!(ok.arguments.get("VISTLE_USE_PYTHON"), Some(&ArgumentValue::Bool(true)));
        assert_eq!(ok.toolchain, "host");
        assert_eq!(ok.run_env.len(), 1);

        let err = resolver
            .resolve(&request(Selection::new().with("python", false).with("tui", true)))
            .unwrap_err();
        match err {
            ResolveError::Conflict { violations, .. } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].message, "Python is required to interpret user input");
            }
            other => panic!("expected a conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_version_and_selection_errors_reported_together() {
        let d = descriptor();
        let req = request(Selection::new().with("mpi", true)).with_version("1999.1");
        let err = Resolver::new(&d).resolve(&req).unwrap_err();
        match &err {
            ResolveError::Selection { errors, .. } => assert_eq!(errors.len(), 2),
            other => panic!("expected selection errors, got {:?}", other),
        }
        assert_eq!(err.stage(), Stage::Validate);

        let req = request(Selection::new()).with_version("master");
        let res = Resolver::new(&d).resolve(&req).unwrap();
        assert_eq!(res.version, Some(PackageVersion::new("master")));
    }

    #[test]
    fn test_missing_prefix_fails_in_environment_stage() {
        let d = descriptor();
        let err = Resolver::new(&d)
            .resolve(&ResolveRequest::new(Selection::new()))
            .unwrap_err();
        assert_eq!(err.stage(), Stage::ComposeEnvironment);
    }

    #[test]
    fn test_deterministic_fingerprint() {
        let d = descriptor();
        let resolver = Resolver::new(&d);
        let req = request(Selection::new().with("tui", false));
        let a = resolver.resolve(&req).unwrap();
        let b = resolver.resolve(&req).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.fingerprint().unwrap(), b.fingerprint().unwrap());
        assert_eq!(
            a.cmake_args(),
            vec!["-DVISTLE_USE_PYTHON:BOOL=ON", "-DVISTLE_PEDANTIC_ERRORS:BOOL=OFF"]
        );
    }
}
