//! High-level operations.
//!
//! This module contains the implementation of keel commands.

pub mod load;
pub mod render;
pub mod resolve;

pub use load::load_descriptor;
pub use render::{format_dependencies, format_edges, format_resolution, format_variants};
pub use resolve::{build_request, build_requests, resolve_many, resolve_spec, ResolveOptions};
