//! keel - variant-conditional package configuration
//!
//! This crate resolves a package descriptor (variants, conditional dependencies,
//! conflicts, argument and environment rules) against a selection, producing the
//! dependency set, build-system arguments and environment mutations for one build.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod util;

pub use core::{
    descriptor::PackageDescriptor, selection::Selection, variant::VariantSpace,
};

pub use resolver::{Resolution, ResolveError, ResolveRequest, Resolver};
pub use util::context::GlobalContext;
