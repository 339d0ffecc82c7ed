//! TOML descriptor schema.
//!
//! A descriptor file is deserialized into the raw `*Toml` structs below and then
//! replayed through a [`DescriptorBuilder`], so files and code build descriptors
//! the same way.
//!
//! Declaration order: capabilities without a `when`, then the `[variants]` table in
//! file order, then scoped capabilities, then every rule in the order it appears in
//! the file. A rule inside a `[[scope]]` block keeps its own position relative to
//! the rules around the block, so a later `[[args]]` entry overrides an earlier
//! scoped one and the other way round.

use glob::Pattern;
use indexmap::IndexMap;
use serde::Deserialize;
use toml::Spanned;

use crate::builder::capabilities::{lookup, KNOWN_CAPABILITIES};
use crate::builder::toolchain::ToolchainRule;
use crate::core::argument::{ArgumentExpr, ArgumentRule, ArgumentValue, Fold};
use crate::core::condition::Condition;
use crate::core::conflict::ConflictRule;
use crate::core::dependency::{DependencyDeclaration, Linkage};
use crate::core::descriptor::{DescriptorBuilder, DescriptorError, PackageDescriptor};
use crate::core::environment::{EnvRule, EnvScope};
use crate::core::template::Template;
use crate::core::variant::{Variant, NONE_VALUE};

/// Conventional descriptor file name.
pub const DESCRIPTOR_NAME: &str = "keel.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(t) => vec![t],
            OneOrMany::Many(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DescriptorToml {
    package: PackageToml,
    #[serde(default)]
    version: Vec<VersionToml>,
    #[serde(default)]
    variants: IndexMap<String, VariantToml>,
    #[serde(default)]
    depends: Vec<Spanned<DependsToml>>,
    #[serde(default)]
    conflicts: Vec<Spanned<ConflictToml>>,
    #[serde(default)]
    args: Vec<Spanned<ArgToml>>,
    #[serde(default)]
    env: EnvToml,
    #[serde(default)]
    toolchain: Vec<Spanned<ToolchainToml>>,
    #[serde(default)]
    scope: Vec<ScopeToml>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PackageToml {
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    capabilities: Vec<CapabilityToml>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CapabilityToml {
    Name(String),
    Scoped { name: String, when: String },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VersionToml {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum DefaultToml {
    Bool(bool),
    Single(String),
    Multi(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VariantToml {
    #[serde(default)]
    default: Option<DefaultToml>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    values: Option<Vec<String>>,
    #[serde(default)]
    multi: bool,
    #[serde(default)]
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DependsToml {
    spec: String,
    #[serde(default)]
    when: Option<String>,
    #[serde(default, rename = "type")]
    linkage: Option<OneOrMany<Linkage>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConflictToml {
    a: String,
    #[serde(default)]
    b: Option<String>,
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    msg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FoldToml {
    variants: OneOrMany<String>,
    #[serde(default)]
    pattern: Option<String>,
    #[serde(default)]
    separator: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LiteralToml {
    Bool(bool),
    String(String),
    List(Vec<String>),
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ArgToml {
    define: String,
    #[serde(default)]
    value: Option<LiteralToml>,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    condition: Option<String>,
    #[serde(default)]
    fold: Option<FoldToml>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    when: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvToml {
    #[serde(default)]
    build: Vec<Spanned<EnvRuleToml>>,
    #[serde(default)]
    run: Vec<Spanned<EnvRuleToml>>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvRuleToml {
    #[serde(default)]
    set: Option<String>,
    #[serde(default)]
    unset: Option<String>,
    #[serde(default)]
    prepend_path: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    when: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolchainToml {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    when: Option<String>,
    dependency: String,
    #[serde(default)]
    cc: Option<String>,
    #[serde(default)]
    cxx: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScopeToml {
    #[serde(default)]
    when: Option<String>,
    #[serde(default)]
    depends: Vec<Spanned<DependsToml>>,
    #[serde(default)]
    conflicts: Vec<Spanned<ConflictToml>>,
    #[serde(default)]
    args: Vec<Spanned<ArgToml>>,
    #[serde(default)]
    env: EnvToml,
    #[serde(default)]
    toolchain: Vec<Spanned<ToolchainToml>>,
    #[serde(default)]
    scope: Vec<ScopeToml>,
}

/// Parse a descriptor from TOML text.
pub fn parse_descriptor(content: &str) -> Result<PackageDescriptor, DescriptorError> {
    let doc: DescriptorToml = toml::from_str(content)?;
    let mut b = DescriptorBuilder::new(doc.package.name)?;
    if let Some(description) = doc.package.description {
        b.description(description);
    }
    if let Some(homepage) = doc.package.homepage {
        b.homepage(homepage);
    }
    for version in doc.version {
        b.version(version.id)?;
    }

    let mut scoped_capabilities = Vec::new();
    for (i, cap) in doc.package.capabilities.into_iter().enumerate() {
        let location = format!("package.capabilities[{}]", i);
        let (name, when) = match cap {
            CapabilityToml::Name(name) => (name, None),
            CapabilityToml::Scoped { name, when } => (name, Some(when)),
        };
        let capability = lookup(&name).ok_or_else(|| {
            DescriptorError::invalid(
                &location,
                format!(
                    "unknown capability `{}` (known: {})",
                    name,
                    KNOWN_CAPABILITIES.join(", ")
                ),
            )
        })?;
        match when {
            None => {
                b.capability(capability)?;
            }
            Some(when) => scoped_capabilities.push((capability, condition(&location, &when)?)),
        }
    }

    for (name, variant) in doc.variants {
        let location = format!("variants.{}", name);
        let variant = variant_from_toml(&location, name, variant)?;
        b.variant(variant)?;
    }

    for (capability, when) in scoped_capabilities {
        b.when(when, |b| {
            b.capability(capability)?;
            Ok(())
        })?;
    }

    let root = ScopeToml {
        when: None,
        depends: doc.depends,
        conflicts: doc.conflicts,
        args: doc.args,
        env: doc.env,
        toolchain: doc.toolchain,
        scope: doc.scope,
    };
    let mut rules = Vec::new();
    collect_rules("", &[], root, &mut rules)?;
    rules.sort_by_key(|rule| rule.offset);
    for rule in rules {
        apply_rule(&mut b, rule)?;
    }

    b.build()
}

/// A rule entry together with the `when` conditions of its enclosing scopes.
struct PlacedRule {
    offset: usize,
    location: String,
    scopes: Vec<Condition>,
    rule: RuleToml,
}

enum RuleToml {
    Depends(DependsToml),
    Conflict(ConflictToml),
    Arg(ArgToml),
    Env(EnvScope, EnvRuleToml),
    Toolchain(ToolchainToml),
}

fn condition(location: &str, s: &str) -> Result<Condition, DescriptorError> {
    s.parse()
        .map_err(|e| DescriptorError::condition(location, e))
}

fn optional_condition(location: &str, s: Option<&str>) -> Result<Condition, DescriptorError> {
    match s {
        Some(s) => condition(location, s),
        None => Ok(Condition::Always),
    }
}

fn template(location: &str, s: &str) -> Result<Template, DescriptorError> {
    s.parse().map_err(|source| DescriptorError::Template {
        location: location.to_string(),
        source,
    })
}

fn variant_from_toml(location: &str, name: String, raw: VariantToml) -> Result<Variant, DescriptorError> {
    let mut variant = match (raw.values, raw.multi) {
        (None, true) => {
            return Err(DescriptorError::invalid(location, "a multi-valued variant needs `values`"))
        }
        (None, false) => match raw.default {
            None => Variant::boolean(name, false),
            Some(DefaultToml::Bool(b)) => Variant::boolean(name, b),
            Some(_) => {
                return Err(DescriptorError::invalid(
                    location,
                    "a variant without `values` is boolean and needs a boolean default",
                ))
            }
        },
        (Some(values), false) => {
            let default = match raw.default {
                Some(DefaultToml::Single(s)) => s,
                None => values
                    .first()
                    .cloned()
                    .ok_or_else(|| DescriptorError::invalid(location, "`values` is empty"))?,
                Some(_) => {
                    return Err(DescriptorError::invalid(location, "the default must be one of `values`"))
                }
            };
            Variant::single(name, values, &default)
        }
        (Some(values), true) => {
            let default: Vec<String> = match raw.default {
                Some(DefaultToml::Multi(list)) => list,
                Some(DefaultToml::Single(s)) => vec![s],
                None if values.iter().any(|v| v == NONE_VALUE) => vec![NONE_VALUE.to_string()],
                None => {
                    return Err(DescriptorError::invalid(
                        location,
                        "a multi-valued variant needs a default unless it allows `none`",
                    ))
                }
                Some(DefaultToml::Bool(_)) => {
                    return Err(DescriptorError::invalid(location, "the default must be a list of `values`"))
                }
            };
            let default: Vec<&str> = default.iter().map(String::as_str).collect();
            Variant::multi(name, values, &default)
        }
    };

    if let Some(description) = raw.description {
        variant = variant.with_description(description);
    }
    if let Some(when) = raw.when {
        variant = variant.when(condition(location, &when)?);
    }
    Ok(variant)
}

/// Flatten a scope into `out`, tagging each rule with its byte offset in the file.
fn collect_rules(
    prefix: &str,
    scopes: &[Condition],
    scope: ScopeToml,
    out: &mut Vec<PlacedRule>,
) -> Result<(), DescriptorError> {
    let mut place = |location: String, entry_offset: usize, rule: RuleToml| {
        out.push(PlacedRule {
            offset: entry_offset,
            location,
            scopes: scopes.to_vec(),
            rule,
        });
    };

    for (i, dep) in scope.depends.into_iter().enumerate() {
        let offset = dep.span().start;
        place(format!("{}depends[{}]", prefix, i), offset, RuleToml::Depends(dep.into_inner()));
    }
    for (i, rule) in scope.conflicts.into_iter().enumerate() {
        let offset = rule.span().start;
        place(format!("{}conflicts[{}]", prefix, i), offset, RuleToml::Conflict(rule.into_inner()));
    }
    for (i, arg) in scope.args.into_iter().enumerate() {
        let offset = arg.span().start;
        place(format!("{}args[{}]", prefix, i), offset, RuleToml::Arg(arg.into_inner()));
    }
    for (env_scope, rules) in [(EnvScope::Build, scope.env.build), (EnvScope::Run, scope.env.run)] {
        for (i, rule) in rules.into_iter().enumerate() {
            let offset = rule.span().start;
            place(
                format!("{}env.{}[{}]", prefix, env_scope, i),
                offset,
                RuleToml::Env(env_scope, rule.into_inner()),
            );
        }
    }
    for (i, tc) in scope.toolchain.into_iter().enumerate() {
        let offset = tc.span().start;
        place(format!("{}toolchain[{}]", prefix, i), offset, RuleToml::Toolchain(tc.into_inner()));
    }

    for (i, nested) in scope.scope.into_iter().enumerate() {
        let location = format!("{}scope[{}]", prefix, i);
        let mut inner = scopes.to_vec();
        inner.push(optional_condition(&location, nested.when.as_deref())?);
        collect_rules(&format!("{}.", location), &inner, nested, out)?;
    }

    Ok(())
}

fn apply_rule(b: &mut DescriptorBuilder, placed: PlacedRule) -> Result<(), DescriptorError> {
    let depth = placed.scopes.len();
    for scope in placed.scopes {
        b.push_scope(scope);
    }
    let result = declare_rule(b, &placed.location, placed.rule);
    for _ in 0..depth {
        b.pop_scope()?;
    }
    result
}

fn declare_rule(b: &mut DescriptorBuilder, location: &str, rule: RuleToml) -> Result<(), DescriptorError> {
    match rule {
        RuleToml::Depends(dep) => {
            let mut declaration = DependencyDeclaration::parse(&dep.spec)
                .map_err(|e| DescriptorError::condition(location, e))?;
            if let Some(linkage) = dep.linkage {
                let linkage = linkage.into_vec();
                if linkage.is_empty() {
                    return Err(DescriptorError::invalid(location, "`type` is empty"));
                }
                declaration = declaration.with_linkage(linkage);
            }
            declaration = declaration.when(optional_condition(location, dep.when.as_deref())?);
            b.depends(declaration);
        }

        RuleToml::Conflict(rule) => {
            let a = condition(location, &rule.a)?;
            let mut conflict = match rule.b {
                Some(other) => ConflictRule::new(a, condition(location, &other)?),
                None => ConflictRule::single(a),
            };
            if let Some(msg) = rule.msg {
                conflict = conflict.with_message(msg);
            }
            if let Some(when) = rule.when {
                conflict = conflict.when(condition(location, &when)?);
            }
            b.conflicts(conflict);
        }

        RuleToml::Arg(arg) => {
            let rule = argument_from_toml(location, arg)?;
            b.argument(rule);
        }

        RuleToml::Env(env_scope, rule) => {
            let rule = env_rule_from_toml(location, rule)?;
            b.env(env_scope, rule);
        }

        RuleToml::Toolchain(tc) => {
            if tc.cc.is_none() && tc.cxx.is_none() {
                return Err(DescriptorError::invalid(location, "a toolchain needs `cc` or `cxx`"));
            }
            let mut rule = ToolchainRule::new(tc.dependency)
                .when(optional_condition(location, tc.when.as_deref())?);
            if let Some(id) = tc.id {
                rule = rule.with_id(id);
            }
            if let Some(cc) = tc.cc {
                rule = rule.with_cc(cc);
            }
            if let Some(cxx) = tc.cxx {
                rule = rule.with_cxx(cxx);
            }
            b.toolchain(rule);
        }
    }
    Ok(())
}

fn argument_from_toml(location: &str, arg: ArgToml) -> Result<ArgumentRule, DescriptorError> {
    let expr = match (arg.value, arg.variant, arg.condition, arg.fold, arg.path) {
        (Some(value), None, None, None, None) => ArgumentExpr::Literal(match value {
            LiteralToml::Bool(b) => ArgumentValue::Bool(b),
            LiteralToml::String(s) => ArgumentValue::String(s),
            LiteralToml::List(l) => ArgumentValue::List(l),
        }),
        (None, Some(variant), None, None, None) => ArgumentExpr::Variant(variant),
        (None, None, Some(c), None, None) => ArgumentExpr::Condition(condition(location, &c)?),
        (None, None, None, Some(fold), None) => {
            let pattern = fold.pattern.as_deref().unwrap_or("*");
            let pattern =
                Pattern::new(pattern).map_err(|e| DescriptorError::invalid(location, e.to_string()))?;
            let mut f = Fold::new(fold.variants.into_vec(), pattern);
            if let Some(separator) = fold.separator {
                f = f.with_separator(separator);
            }
            ArgumentExpr::Fold(f)
        }
        (None, None, None, None, Some(path)) => ArgumentExpr::Path(template(location, &path)?),
        _ => {
            return Err(DescriptorError::invalid(
                location,
                "exactly one of `value`, `variant`, `condition`, `fold` or `path` is required",
            ))
        }
    };

    Ok(ArgumentRule::new(arg.define, expr).when(optional_condition(location, arg.when.as_deref())?))
}

fn env_rule_from_toml(location: &str, raw: EnvRuleToml) -> Result<EnvRule, DescriptorError> {
    let value = |raw_value: Option<String>| -> Result<Template, DescriptorError> {
        let v = raw_value.ok_or_else(|| DescriptorError::invalid(location, "`value` is required"))?;
        template(location, &v)
    };

    let rule = match (raw.set, raw.unset, raw.prepend_path) {
        (Some(key), None, None) => EnvRule::set(key, value(raw.value)?),
        (None, Some(key), None) => {
            if raw.value.is_some() {
                return Err(DescriptorError::invalid(location, "`unset` takes no `value`"));
            }
            EnvRule::unset(key)
        }
        (None, None, Some(key)) => EnvRule::prepend_path(key, value(raw.value)?),
        _ => {
            return Err(DescriptorError::invalid(
                location,
                "exactly one of `set`, `unset` or `prepend_path` is required",
            ))
        }
    };
    Ok(rule.when(optional_condition(location, raw.when.as_deref())?))
}
