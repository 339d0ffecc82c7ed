//! `keel check` command
//!
//! Loading a descriptor runs every declaration check; this reports the result and
//! warns about rules that mention variants nobody declared.

use anyhow::Result;
use serde_json::json;

use keel::util::config::OutputFormat;
use keel::util::diagnostic::{emit, Diagnostic};
use keel::util::hash::{sha256_file, short};

use super::{load, print_json, Session};
use crate::cli::CheckArgs;

pub fn execute(session: &Session, args: CheckArgs) -> Result<()> {
    let path = session.ctx.descriptor_path(&args.descriptor)?;
    let descriptor = load(session, &path)?;
    let digest = sha256_file(&path)?;
    let undeclared = descriptor.undeclared_references();

    if session.format == OutputFormat::Json {
        return print_json(&json!({
            "package": descriptor.name,
            "path": path,
            "sha256": digest,
            "versions": descriptor.versions.iter().map(|v| v.as_str()).collect::<Vec<_>>(),
            "variants": descriptor.variants.len(),
            "dependencies": descriptor.dependencies.len(),
            "conflicts": descriptor.conflicts.len(),
            "arguments": descriptor.arguments.len(),
            "capabilities": descriptor.capabilities,
            "undeclared": undeclared,
        }));
    }

    for name in &undeclared {
        emit(
            &Diagnostic::warning(format!("variant `{}` is referenced but never declared", name))
                .with_location(&path)
                .with_context("conditions on an undeclared variant never hold")
                .with_suggestion(format!("Declare `[variants.{}]` or fix the spelling", name)),
            session.ctx.color(),
        );
    }

    println!(
        "{} is valid: {} version(s), {} variant(s), {} dependency declaration(s), {} conflict rule(s), {} argument rule(s)",
        descriptor.name,
        descriptor.versions.len(),
        descriptor.variants.len(),
        descriptor.dependencies.len(),
        descriptor.conflicts.len(),
        descriptor.arguments.len(),
    );
    println!("sha256: {}", short(&digest));
    Ok(())
}
