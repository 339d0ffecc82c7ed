//! `keel resolve` command

use anyhow::Result;
use serde_json::json;

use keel::ops;
use keel::util::config::OutputFormat;
use keel::util::diagnostic::emit;

use super::{load, options, print_json, ResolutionFailed, Session};
use crate::cli::ResolveArgs;

pub fn execute(session: &Session, args: ResolveArgs) -> Result<()> {
    let descriptor = load(session, &args.select.descriptor)?;
    let opts = options(&args.select, args.specs);
    let requests = ops::build_requests(&descriptor, session.ctx.config(), &opts)?;

    // A single request surfaces its error directly so main can report it
    if requests.len() == 1 {
        let resolution = ops::resolve_spec(&descriptor, &requests[0])?;
        let fingerprint = resolution.fingerprint()?;
        return match session.format {
            OutputFormat::Text => {
                print!("{}", ops::format_resolution(&resolution, &fingerprint));
                Ok(())
            }
            OutputFormat::Json => print_json(&json!({
                "fingerprint": fingerprint,
                "resolution": resolution,
            })),
        };
    }

    let results = ops::resolve_many(&descriptor, &requests);
    let specs: Vec<&str> = opts.specs.iter().map(String::as_str).collect();
    let mut failed = 0;
    let mut reports = Vec::with_capacity(results.len());

    for (i, (spec, result)) in specs.iter().zip(&results).enumerate() {
        match (session.format, result) {
            (OutputFormat::Text, Ok(resolution)) => {
                if i > 0 {
                    println!();
                }
                print!("{}", ops::format_resolution(resolution, &resolution.fingerprint()?));
            }
            (OutputFormat::Text, Err(e)) => {
                failed += 1;
                emit(&e.to_diagnostic().with_context(format!("selection `{}`", spec)), session.ctx.color());
            }
            (OutputFormat::Json, Ok(resolution)) => reports.push(json!({
                "spec": spec,
                "fingerprint": resolution.fingerprint()?,
                "resolution": resolution,
            })),
            (OutputFormat::Json, Err(e)) => {
                failed += 1;
                reports.push(json!({
                    "spec": spec,
                    "error": { "code": e.code(), "stage": e.stage().to_string(), "message": e.to_diagnostic().format(false) },
                }));
            }
        }
    }

    if session.format == OutputFormat::Json {
        print_json(&reports)?;
    }

    if failed > 0 {
        return Err(ResolutionFailed {
            failed,
            total: results.len(),
        }
        .into());
    }
    Ok(())
}
