//! Turning a resolved selection into build-system inputs.
//!
//! Argument synthesis, environment composition, toolchain selection, reusable
//! capabilities and CMake rendering.

pub mod arguments;
pub mod capabilities;
pub mod cmake;
pub mod environment;
pub mod toolchain;

use thiserror::Error;

use crate::core::template::TemplateError;

pub use arguments::{ArgumentSynthesizer, Arguments};
pub use capabilities::Capability;
pub use environment::{EnvMutation, EnvMutations, EnvironmentComposer};
pub use toolchain::{select_strategy, CompilerStrategy, ToolchainRule};

/// A rule whose value could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{rule}: {source}")]
pub struct RuleError {
    pub rule: String,
    pub source: TemplateError,
}

impl RuleError {
    pub fn new(rule: impl Into<String>, source: TemplateError) -> Self {
        RuleError {
            rule: rule.into(),
            source,
        }
    }
}
