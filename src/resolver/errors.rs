//! Resolution error types and diagnostics.

use std::fmt;

use thiserror::Error;

use crate::builder::RuleError;
use crate::core::template::TemplateError;
use crate::core::variant::VariantError;
use crate::resolver::conflicts::ConflictViolation;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Pipeline stages that can fail, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Validate,
    BuildDependencies,
    CheckConflicts,
    SynthesizeArguments,
    ComposeEnvironment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "validate",
            Stage::BuildDependencies => "build dependencies",
            Stage::CheckConflicts => "check conflicts",
            Stage::SynthesizeArguments => "synthesize arguments",
            Stage::ComposeEnvironment => "compose environment",
        };
        f.write_str(name)
    }
}

/// Error during resolution. Each variant belongs to exactly one stage and carries
/// every problem that stage found.
#[derive(Debug, Error, miette::Diagnostic)]
pub enum ResolveError {
    #[error("invalid selection for `{package}`")]
    #[diagnostic(code(keel::resolve::selection))]
    Selection {
        package: String,
        errors: Vec<VariantError>,
    },

    #[error("`{package}` depends on itself")]
    #[diagnostic(code(keel::resolve::self_dependency))]
    SelfDependency { package: String, condition: String },

    #[error("{} conflict(s) in the selection for `{package}`", .violations.len())]
    #[diagnostic(
        code(keel::resolve::conflict),
        help("Change the selection so that no rule has both sides true")
    )]
    Conflict {
        package: String,
        violations: Vec<ConflictViolation>,
    },

    #[error("failed to {stage}")]
    #[diagnostic(code(keel::resolve::rule))]
    Rule {
        stage: Stage,
        #[source]
        source: RuleError,
    },
}

impl ResolveError {
    /// The stage that failed.
    pub fn stage(&self) -> Stage {
        match self {
            ResolveError::Selection { .. } => Stage::Validate,
            ResolveError::SelfDependency { .. } => Stage::BuildDependencies,
            ResolveError::Conflict { .. } => Stage::CheckConflicts,
            ResolveError::Rule { stage, .. } => *stage,
        }
    }

    /// Diagnostic code, e.g. `keel::resolve::conflict`.
    pub fn code(&self) -> String {
        miette::Diagnostic::code(self)
            .map(|c| c.to_string())
            .unwrap_or_default()
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::Selection { package, errors } => {
                let mut diag = Diagnostic::error(format!("invalid selection for `{}`", package));
                for error in errors {
                    diag = diag.with_context(error.to_string());
                }
                for error in errors {
                    match error {
                        VariantError::Unknown { known, .. } if !known.is_empty() => {
                            diag = diag.with_suggestion(format!("Known variants: {}", known.join(", ")));
                        }
                        VariantError::Inactive { name, condition } => {
                            diag = diag.with_suggestion(format!(
                                "Remove `{}` from the selection or select `{}`",
                                name, condition
                            ));
                        }
                        VariantError::UnknownVersion { known, .. } => {
                            diag = diag.with_suggestion(format!("Known versions: {}", known.join(", ")));
                        }
                        _ => {}
                    }
                }
                diag.with_suggestion(format!("Run `keel variants` to list the options of `{}`", package))
            }

            ResolveError::SelfDependency { package, condition } => {
                let mut diag = Diagnostic::error(format!("`{}` depends on itself", package));
                if !condition.is_empty() {
                    diag = diag.with_context(format!("declared when `{}`", condition));
                }
                diag.with_suggestion("Remove the dependency declaration naming the package itself")
            }

            ResolveError::Conflict { package, violations } => {
                let mut diag = Diagnostic::error(format!(
                    "{} conflict(s) in the selection for `{}`",
                    violations.len(),
                    package
                ));
                for v in violations {
                    let rule = if v.b.is_empty() {
                        format!("`{}`", v.a)
                    } else {
                        format!("`{}` with `{}`", v.a, v.b)
                    };
                    diag = diag.with_context(format!("{} ({})", v.message, rule));
                }
                diag.with_suggestion("Change the selection so that no rule has both sides true")
            }

            ResolveError::Rule { stage, source } => {
                let diag = Diagnostic::error(format!("failed to {}", stage)).with_context(source.to_string());
                match &source.source {
                    TemplateError::UnresolvedPrefix { .. } => diag.with_suggestion(suggestions::MISSING_PREFIX),
                    TemplateError::UnsetVariant { name } => diag.with_suggestion(format!(
                        "Guard the rule with a `when` that makes `{}` active",
                        name
                    )),
                    TemplateError::MissingVersion => {
                        diag.with_suggestion("Declare `[[version]]` entries or pass `--version`")
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_diagnostic() {
        let err = ResolveError::Conflict {
            package: "vistle".to_string(),
            violations: vec![
                ConflictViolation {
                    rule: 0,
                    a: "+tui".to_string(),
                    b: "~python".to_string(),
                    message: "Python is required to interpret user input".to_string(),
                },
                ConflictViolation {
                    rule: 3,
                    a: "%gcc@:4.99".to_string(),
                    b: String::new(),
                    message: "C++17 is required".to_string(),
                },
            ],
        };

        let output = err.to_diagnostic().format(false);
        assert!(output.contains("2 conflict(s)"));
        assert!(output.contains("Python is required to interpret user input (`+tui` with `~python`)"));
        assert!(output.contains("C++17 is required (`%gcc@:4.99`)"));
        assert_eq!(err.stage(), Stage::CheckConflicts);
        assert_eq!(err.code(), "keel::resolve::conflict");
    }

    #[test]
    fn test_rule_diagnostic_suggestion() {
        let rule = |source| ResolveError::Rule {
            stage: Stage::ComposeEnvironment,
            source: RuleError::new("env.run[0]", source),
        };

        let output = rule(TemplateError::UnresolvedPrefix { name: "vistle".to_string() })
            .to_diagnostic()
            .format(false);
        assert!(output.contains("no install prefix known for `vistle`"));
        assert!(output.contains("--prefix"));

        let output = rule(TemplateError::UnsetVariant { name: "amdgpu_target".to_string() })
            .to_diagnostic()
            .format(false);
        assert!(output.contains("makes `amdgpu_target` active"));
        assert!(!output.contains("--prefix"));

        let output = rule(TemplateError::MissingVersion).to_diagnostic().format(false);
        assert!(output.contains("--version"));
        assert!(!output.contains("--prefix"));
    }

    #[test]
    fn test_selection_diagnostic() {
        let err = ResolveError::Selection {
            package: "vistle".to_string(),
            errors: vec![VariantError::Inactive {
                name: "kokkos".to_string(),
                condition: "~vtkm".to_string(),
            }],
        };
        let output = err.to_diagnostic().format(false);
        assert!(output.contains("invalid selection for `vistle`"));
        assert!(output.contains("variant `kokkos` cannot be set"));
        assert!(output.contains("select `~vtkm`"));
        assert_eq!(err.stage(), Stage::Validate);
    }

    #[test]
    fn test_stage_order() {
        assert!(Stage::Validate < Stage::CheckConflicts);
        assert!(Stage::SynthesizeArguments < Stage::ComposeEnvironment);
        assert_eq!(Stage::BuildDependencies.to_string(), "build dependencies");
    }
}
