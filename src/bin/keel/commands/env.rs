//! `keel env` command
//!
//! Prints build-time mutations by default; `--run` prints the run-time set.

use anyhow::Result;

use keel::util::config::OutputFormat;

use super::{print_json, resolve_one, Session};
use crate::cli::EnvArgs;

pub fn execute(session: &Session, args: EnvArgs) -> Result<()> {
    let resolution = resolve_one(session, &args.select, args.spec.as_deref())?;
    let mutations = if args.run {
        &resolution.run_env
    } else {
        &resolution.build_env
    };

    match session.format {
        OutputFormat::Text => {
            print!("{}", mutations.to_shell());
            Ok(())
        }
        OutputFormat::Json => print_json(mutations),
    }
}
