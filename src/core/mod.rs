//! Core data model.
//!
//! - Variants, selections and the conditions evaluated over them
//! - Versions and static facts
//! - Dependency, conflict, argument and environment rules
//! - Package descriptors and their TOML form

pub mod argument;
pub mod condition;
pub mod conflict;
pub mod dependency;
pub mod descriptor;
pub mod environment;
pub mod facts;
pub mod manifest;
pub mod selection;
pub mod template;
pub mod variant;
pub mod version;

pub use argument::{ArgumentExpr, ArgumentRule, ArgumentValue};
pub use condition::{Condition, ConditionParseError, EvalContext};
pub use conflict::ConflictRule;
pub use dependency::{DependencyDeclaration, Linkage};
pub use descriptor::{DescriptorBuilder, DescriptorError, PackageDescriptor};
pub use environment::{EnvRule, EnvScope};
pub use facts::{CompilerId, Facts};
pub use selection::{parse_spec, Selection, SpecRequest};
pub use variant::{Variant, VariantError, VariantKind, VariantSpace, VariantValue};
pub use version::{PackageVersion, VersionRange};
