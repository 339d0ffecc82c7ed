//! `keel deps` command

use anyhow::Result;

use keel::ops;
use keel::util::config::OutputFormat;

use super::{print_json, resolve_one, Session};
use crate::cli::DepsArgs;

pub fn execute(session: &Session, args: DepsArgs) -> Result<()> {
    let resolution = resolve_one(session, &args.select, args.spec.as_deref())?;
    let graph = &resolution.dependencies;

    if args.dot {
        print!("{}", graph.to_dot());
        return Ok(());
    }

    if let Some(linkage) = args.linkage {
        let edges: Vec<_> = graph.with_linkage(linkage).collect();
        return match session.format {
            OutputFormat::Text => {
                print!("{}", ops::format_edges(&edges));
                Ok(())
            }
            OutputFormat::Json => print_json(&edges),
        };
    }

    match session.format {
        OutputFormat::Text => {
            if graph.is_empty() {
                println!("{} has no dependencies for this selection", graph.package());
            } else {
                print!("{}", ops::format_dependencies(graph));
            }
            Ok(())
        }
        OutputFormat::Json => print_json(graph),
    }
}
