//! Conflict rules: pairs of conditions that must never hold together.

use serde::Serialize;

use crate::core::condition::Condition;

/// Two conditions that may not both be true for one resolution.
///
/// A rule with a single condition is stored with `b = Always`, so it is violated
/// whenever `a` holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictRule {
    pub a: Condition,
    pub b: Condition,
    pub message: String,
}

impl ConflictRule {
    /// Create a rule with the default message.
    pub fn new(a: Condition, b: Condition) -> Self {
        let message = default_message(&a, &b);
        ConflictRule { a, b, message }
    }

    /// A rule violated whenever `a` holds.
    pub fn single(a: Condition) -> Self {
        ConflictRule::new(a, Condition::Always)
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Conjoin `condition` into the `b` side. Used for enclosing scopes.
    /// A default message is regenerated to name the new `b`.
    pub fn when(mut self, condition: Condition) -> Self {
        let default = self.message == default_message(&self.a, &self.b);
        self.b = self.b.and(condition);
        if default {
            self.message = default_message(&self.a, &self.b);
        }
        self
    }
}

fn default_message(a: &Condition, b: &Condition) -> String {
    if b.is_always() {
        format!("'{}' is not supported", a)
    } else {
        format!("'{}' conflicts with '{}'", a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cond(s: &str) -> Condition {
        s.parse().unwrap()
    }

    #[test]
    fn test_default_messages() {
        let rule = ConflictRule::new(cond("+tui"), cond("~python"));
        assert_eq!(rule.message, "'+tui' conflicts with '~python'");

        let rule = ConflictRule::single(cond("%gcc@:4.99"));
        assert_eq!(rule.message, "'%gcc@:4.99' is not supported");
        assert!(rule.b.is_always());
    }

    #[test]
    fn test_when_updates_default_message() {
        let rule = ConflictRule::single(cond("+kokkos")).when(cond("+vtkm"));
        assert_eq!(rule.message, "'+kokkos' conflicts with '+vtkm'");

        let rule = ConflictRule::new(cond("+rocm"), cond("+cuda")).when(cond("~vtkm"));
        assert_eq!(rule.message, "'+rocm' conflicts with '+cuda ~vtkm'");

        // An unscoped rule is unchanged
        let rule = ConflictRule::single(cond("+kokkos")).when(Condition::Always);
        assert_eq!(rule.message, "'+kokkos' is not supported");
    }

    #[test]
    fn test_when_keeps_message() {
        let rule = ConflictRule::single(cond("+kokkos"))
            .with_message("VTK-m brings its own Kokkos")
            .when(cond("+vtkm"));
        assert_eq!(rule.b, cond("+vtkm"));
        assert_eq!(rule.message, "VTK-m brings its own Kokkos");
    }
}
