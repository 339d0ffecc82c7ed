//! Command implementations

pub mod args;
pub mod check;
pub mod completions;
pub mod deps;
pub mod env;
pub mod resolve;
pub mod variants;

use anyhow::Result;
use thiserror::Error;

use keel::core::PackageDescriptor;
use keel::ops::{self, ResolveOptions};
use keel::util::config::OutputFormat;
use keel::util::GlobalContext;
use keel::Resolution;

use crate::cli::SelectArgs;

/// Settings every command reads.
pub struct Session {
    pub ctx: GlobalContext,
    pub format: OutputFormat,
}

/// Some resolutions of a batch failed; their diagnostics were already printed.
#[derive(Debug, Error)]
#[error("{failed} of {total} resolution(s) failed")]
pub struct ResolutionFailed {
    pub failed: usize,
    pub total: usize,
}

pub fn load(session: &Session, descriptor: &std::path::Path) -> Result<PackageDescriptor> {
    let path = session.ctx.descriptor_path(descriptor)?;
    ops::load_descriptor(&path)
}

fn options(select: &SelectArgs, specs: Vec<String>) -> ResolveOptions {
    ResolveOptions {
        specs,
        version: select.version.clone(),
        prefixes: select.prefixes.iter().cloned().collect(),
    }
}

/// Load the descriptor and resolve a single selection.
pub fn resolve_one(session: &Session, select: &SelectArgs, spec: Option<&str>) -> Result<Resolution> {
    let descriptor = load(session, &select.descriptor)?;
    let opts = options(select, Vec::new());
    let request = ops::build_request(&descriptor, session.ctx.config(), spec.unwrap_or(""), &opts)?;
    Ok(ops::resolve_spec(&descriptor, &request)?)
}

pub fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
