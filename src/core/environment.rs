//! Environment mutation rules for build time and run time.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::condition::Condition;
use crate::core::template::Template;

/// When a set of mutations is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnvScope {
    Build,
    Run,
}

impl fmt::Display for EnvScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvScope::Build => write!(f, "build"),
            EnvScope::Run => write!(f, "run"),
        }
    }
}

/// What a rule does to its variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvAction {
    Set(Template),
    Unset,
    PrependPath(Template),
}

/// A conditional mutation of one environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRule {
    pub key: String,
    pub action: EnvAction,
    pub condition: Condition,
}

impl EnvRule {
    pub fn set(key: impl Into<String>, value: Template) -> Self {
        EnvRule {
            key: key.into(),
            action: EnvAction::Set(value),
            condition: Condition::Always,
        }
    }

    pub fn unset(key: impl Into<String>) -> Self {
        EnvRule {
            key: key.into(),
            action: EnvAction::Unset,
            condition: Condition::Always,
        }
    }

    pub fn prepend_path(key: impl Into<String>, value: Template) -> Self {
        EnvRule {
            key: key.into(),
            action: EnvAction::PrependPath(value),
            condition: Condition::Always,
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = self.condition.and(condition);
        self
    }
}
