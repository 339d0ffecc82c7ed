//! `keel variants` command

use anyhow::Result;

use keel::ops;
use keel::util::config::OutputFormat;

use super::{load, print_json, Session};
use crate::cli::VariantsArgs;

pub fn execute(session: &Session, args: VariantsArgs) -> Result<()> {
    let descriptor = load(session, &args.descriptor)?;

    match session.format {
        OutputFormat::Text => {
            print!("{}", ops::format_variants(&descriptor));
            Ok(())
        }
        OutputFormat::Json => {
            let variants: Vec<_> = descriptor.variants.iter().collect();
            print_json(&variants)
        }
    }
}
