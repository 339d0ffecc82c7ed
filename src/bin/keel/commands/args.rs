//! `keel args` command

use anyhow::Result;

use keel::util::config::OutputFormat;

use super::{print_json, resolve_one, Session};
use crate::cli::ArgsArgs;

pub fn execute(session: &Session, args: ArgsArgs) -> Result<()> {
    let resolution = resolve_one(session, &args.select, args.spec.as_deref())?;

    match session.format {
        OutputFormat::Text => {
            for arg in resolution.cmake_args() {
                println!("{}", arg);
            }
            Ok(())
        }
        OutputFormat::Json => print_json(&resolution.arguments),
    }
}
