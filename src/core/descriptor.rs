//! Package descriptors and the scoped builder that assembles them.

use std::collections::BTreeSet;

use thiserror::Error;

use crate::builder::capabilities::Capability;
use crate::builder::toolchain::ToolchainRule;
use crate::core::argument::ArgumentRule;
use crate::core::condition::{Condition, ConditionParseError};
use crate::core::conflict::ConflictRule;
use crate::core::dependency::{DependencyDeclaration, Linkage};
use crate::core::environment::{EnvRule, EnvScope};
use crate::core::template::TemplateParseError;
use crate::core::variant::{is_valid_name, Variant, VariantError, VariantSpace};
use crate::core::version::PackageVersion;

/// Error raised while loading or assembling a descriptor.
#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("{location}: {source}")]
    Condition {
        location: String,
        #[source]
        source: ConditionParseError,
    },

    #[error("{location}: {source}")]
    Template {
        location: String,
        #[source]
        source: TemplateParseError,
    },

    #[error(transparent)]
    Variant(#[from] VariantError),

    #[error("{location}: {message}")]
    Invalid { location: String, message: String },

    #[error("failed to parse descriptor")]
    Toml(#[from] toml::de::Error),
}

impl DescriptorError {
    pub fn invalid(location: impl Into<String>, message: impl Into<String>) -> Self {
        DescriptorError::Invalid {
            location: location.into(),
            message: message.into(),
        }
    }

    pub(crate) fn condition(location: impl Into<String>, source: ConditionParseError) -> Self {
        DescriptorError::Condition {
            location: location.into(),
            source,
        }
    }
}

/// The complete, read-only configuration of one package.
#[derive(Debug, Clone, Default)]
pub struct PackageDescriptor {
    pub name: String,
    pub description: String,
    pub homepage: Option<String>,
    pub versions: Vec<PackageVersion>,
    pub variants: VariantSpace,
    pub dependencies: Vec<DependencyDeclaration>,
    pub conflicts: Vec<ConflictRule>,
    pub arguments: Vec<ArgumentRule>,
    pub build_env: Vec<EnvRule>,
    pub run_env: Vec<EnvRule>,
    pub toolchains: Vec<ToolchainRule>,
    pub capabilities: Vec<String>,
}

impl PackageDescriptor {
    /// Look up a declared version by its identifier.
    pub fn find_version(&self, id: &str) -> Option<&PackageVersion> {
        self.versions.iter().find(|v| v.as_str() == id)
    }

    /// The version used when none is requested: the highest numeric version,
    /// otherwise the first one declared.
    pub fn default_version(&self) -> Option<&PackageVersion> {
        self.versions
            .iter()
            .filter(|v| v.is_numeric())
            .max()
            .or_else(|| self.versions.first())
    }

    /// Variants referenced by rules but never declared. Such atoms are always false,
    /// which is usually a typo.
    pub fn undeclared_references(&self) -> BTreeSet<String> {
        let mut referenced: BTreeSet<&str> = BTreeSet::new();
        for dep in &self.dependencies {
            referenced.extend(dep.referenced_variants());
        }
        for rule in &self.conflicts {
            referenced.extend(rule.a.referenced_variants());
            referenced.extend(rule.b.referenced_variants());
        }
        for rule in &self.arguments {
            referenced.extend(rule.condition.referenced_variants());
            match &rule.expr {
                crate::core::argument::ArgumentExpr::Variant(name) => {
                    referenced.insert(name.as_str());
                }
                crate::core::argument::ArgumentExpr::Condition(c) => {
                    referenced.extend(c.referenced_variants());
                }
                crate::core::argument::ArgumentExpr::Fold(fold) => {
                    referenced.extend(fold.variants.iter().map(String::as_str));
                }
                _ => {}
            }
        }
        for rule in self.build_env.iter().chain(&self.run_env) {
            referenced.extend(rule.condition.referenced_variants());
        }
        for rule in &self.toolchains {
            referenced.extend(rule.condition.referenced_variants());
        }

        referenced
            .into_iter()
            .filter(|name| !self.variants.contains(name))
            .map(str::to_string)
            .collect()
    }
}

/// Assembles a [`PackageDescriptor`], keeping a stack of enclosing scope conditions.
///
/// Every declaration made while scopes are open is conjoined with all of them.
#[derive(Debug)]
pub struct DescriptorBuilder {
    descriptor: PackageDescriptor,
    scopes: Vec<Condition>,
}

impl DescriptorBuilder {
    pub fn new(name: impl Into<String>) -> Result<Self, DescriptorError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(DescriptorError::invalid(
                "package.name",
                format!("`{}` is not a valid package name", name),
            ));
        }
        Ok(DescriptorBuilder {
            descriptor: PackageDescriptor {
                name,
                ..Default::default()
            },
            scopes: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn description(&mut self, description: impl Into<String>) -> &mut Self {
        self.descriptor.description = description.into();
        self
    }

    pub fn homepage(&mut self, homepage: impl Into<String>) -> &mut Self {
        self.descriptor.homepage = Some(homepage.into());
        self
    }

    pub fn version(&mut self, id: impl Into<String>) -> Result<&mut Self, DescriptorError> {
        let version = PackageVersion::new(id);
        if self.descriptor.find_version(version.as_str()).is_some() {
            return Err(DescriptorError::invalid(
                "version",
                format!("version `{}` is declared twice", version),
            ));
        }
        self.descriptor.versions.push(version);
        Ok(self)
    }

    /// The conjunction of every open scope.
    pub fn scope(&self) -> Condition {
        Condition::all(self.scopes.iter().cloned())
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn push_scope(&mut self, condition: Condition) -> &mut Self {
        self.scopes.push(condition);
        self
    }

    pub fn pop_scope(&mut self) -> Result<&mut Self, DescriptorError> {
        if self.scopes.pop().is_none() {
            return Err(DescriptorError::invalid("scope", "no scope is open"));
        }
        Ok(self)
    }

    /// Run `f` with `condition` pushed as a scope.
    pub fn when<F>(&mut self, condition: Condition, f: F) -> Result<&mut Self, DescriptorError>
    where
        F: FnOnce(&mut Self) -> Result<(), DescriptorError>,
    {
        self.push_scope(condition);
        let result = f(self);
        self.pop_scope()?;
        result.map(|_| self)
    }

    pub fn variant(&mut self, mut variant: Variant) -> Result<&mut Self, DescriptorError> {
        variant.condition = self.scope().and(variant.condition);
        self.descriptor.variants.declare(variant)?;
        Ok(self)
    }

    pub fn depends(&mut self, mut dependency: DependencyDeclaration) -> &mut Self {
        dependency.condition = self.scope().and(dependency.condition);
        self.descriptor.dependencies.push(dependency);
        self
    }

    /// Parse and declare a dependency. An empty `linkage` means build and link.
    pub fn depends_on(&mut self, spec: &str, linkage: &[Linkage]) -> Result<&mut Self, DescriptorError> {
        let mut dependency = DependencyDeclaration::parse(spec)
            .map_err(|e| DescriptorError::condition(format!("dependency `{}`", spec), e))?;
        if !linkage.is_empty() {
            dependency = dependency.with_linkage(linkage.iter().copied());
        }
        Ok(self.depends(dependency))
    }

    pub fn conflicts(&mut self, rule: ConflictRule) -> &mut Self {
        let scope = self.scope();
        self.descriptor.conflicts.push(rule.when(scope));
        self
    }

    pub fn argument(&mut self, mut rule: ArgumentRule) -> &mut Self {
        rule.condition = self.scope().and(rule.condition);
        self.descriptor.arguments.push(rule);
        self
    }

    pub fn env(&mut self, scope: EnvScope, mut rule: EnvRule) -> &mut Self {
        rule.condition = self.scope().and(rule.condition);
        match scope {
            EnvScope::Build => self.descriptor.build_env.push(rule),
            EnvScope::Run => self.descriptor.run_env.push(rule),
        }
        self
    }

    pub fn toolchain(&mut self, mut rule: ToolchainRule) -> &mut Self {
        rule.condition = self.scope().and(rule.condition);
        self.descriptor.toolchains.push(rule);
        self
    }

    /// Add a capability's declarations under the current scope.
    pub fn capability<C: Capability + ?Sized>(&mut self, capability: &C) -> Result<&mut Self, DescriptorError> {
        tracing::debug!(capability = capability.name(), "adding capability");
        capability.contribute(self)?;
        if !self.descriptor.capabilities.iter().any(|c| c == capability.name()) {
            self.descriptor.capabilities.push(capability.name().to_string());
        }
        Ok(self)
    }

    pub fn build(self) -> Result<PackageDescriptor, DescriptorError> {
        if !self.scopes.is_empty() {
            return Err(DescriptorError::invalid(
                "scope",
                format!("{} scope(s) left open", self.scopes.len()),
            ));
        }
        Ok(self.descriptor)
    }
}
