//! keel CLI - variant-conditional package configuration

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{ResolutionFailed, Session};
use keel::util::diagnostic::{emit, DescriptorSyntaxError};
use keel::util::GlobalContext;
use keel::ResolveError;

/// Exit code for a selection that cannot be resolved.
const EXIT_RESOLVE: i32 = 2;

fn main() {
    let cli = Cli::parse();
    let color = !cli.no_color;

    if let Err(e) = run(cli) {
        std::process::exit(report(&e, color));
    }
}

fn report(e: &anyhow::Error, color: bool) -> i32 {
    if let Some(err) = e.downcast_ref::<ResolveError>() {
        emit(&err.to_diagnostic(), color);
        return EXIT_RESOLVE;
    }
    if let Some(err) = e.downcast_ref::<ResolutionFailed>() {
        eprintln!("error: {}", err);
        return EXIT_RESOLVE;
    }
    if let Some(err) = e.downcast_ref::<DescriptorSyntaxError>() {
        eprint!("{}", err.render(color));
        return 1;
    }
    eprintln!("error: {:#}", e);
    1
}

fn run(cli: Cli) -> Result<()> {
    // Set up logging
    let default = if cli.verbose { "keel=debug" } else { "keel=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(cli.verbose);
    if cli.no_color {
        ctx.set_color(false);
    }
    let format = cli.format.map(Into::into).unwrap_or_else(|| ctx.config().format());
    let session = Session { ctx, format };

    // Execute command
    match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(&session, args),
        Commands::Args(args) => commands::args::execute(&session, args),
        Commands::Env(args) => commands::env::execute(&session, args),
        Commands::Deps(args) => commands::deps::execute(&session, args),
        Commands::Variants(args) => commands::variants::execute(&session, args),
        Commands::Check(args) => commands::check::execute(&session, args),
        Commands::Completions(args) => commands::completions::execute(args),
    }
}
