//! Conflict checking over a selection and its dependency set.

use serde::Serialize;

use crate::core::condition::EvalContext;
use crate::core::conflict::ConflictRule;
use crate::core::facts::Facts;
use crate::core::selection::Selection;
use crate::resolver::graph::DependencyGraph;

/// A violated conflict rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictViolation {
    /// Position of the rule in the descriptor
    pub rule: usize,
    pub a: String,
    pub b: String,
    pub message: String,
}

pub struct ConflictChecker;

impl ConflictChecker {
    /// Every rule whose two conditions both hold. `^name` atoms see `graph`.
    pub fn check(
        selection: &Selection,
        facts: &Facts,
        graph: &DependencyGraph,
        rules: &[ConflictRule],
    ) -> Vec<ConflictViolation> {
        let ctx = EvalContext::new(selection, facts).with_dependencies(graph);
        let violations: Vec<ConflictViolation> = rules
            .iter()
            .enumerate()
            .filter(|(_, rule)| rule.a.evaluate_in(&ctx) && rule.b.evaluate_in(&ctx))
            .map(|(i, rule)| ConflictViolation {
                rule: i,
                a: rule.a.to_string(),
                b: rule.b.to_string(),
                message: rule.message.clone(),
            })
            .collect();

        tracing::debug!(rules = rules.len(), violations = violations.len(), "checked conflicts");
        violations
    }
}
