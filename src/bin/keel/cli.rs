//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use keel::core::Linkage;
use keel::util::config::OutputFormat;

/// keel - resolve package variants into dependencies, build arguments and environments
#[derive(Parser)]
#[command(name = "keel")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Output format (defaults to `[output] format` from config)
    #[arg(long, global = true, value_enum, env = "KEEL_FORMAT")]
    pub format: Option<FormatArg>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve one or more selections of a package
    Resolve(ResolveArgs),

    /// Print the CMake arguments of a selection
    Args(ArgsArgs),

    /// Print the environment mutations of a selection as shell
    Env(EnvArgs),

    /// Show the dependency set of a selection
    Deps(DepsArgs),

    /// List the variants a package declares
    Variants(VariantsArgs),

    /// Load a descriptor and report declaration errors
    Check(CheckArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => OutputFormat::Text,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

/// Options shared by every command that resolves a selection.
#[derive(Args)]
pub struct SelectArgs {
    /// Package descriptor (a keel.toml or the directory holding one)
    pub descriptor: PathBuf,

    /// Package version, unless the selection gives `@version`
    #[arg(long)]
    pub version: Option<String>,

    /// Install prefix of a package
    #[arg(long = "prefix", value_name = "NAME=PATH", value_parser = parse_prefix)]
    pub prefixes: Vec<(String, PathBuf)>,
}

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Selections such as `+python~tui`; several are resolved in parallel
    pub specs: Vec<String>,
}

#[derive(Args)]
pub struct ArgsArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Selection, e.g. `+rocm amdgpu_target=gfx90a`
    pub spec: Option<String>,
}

#[derive(Args)]
pub struct EnvArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Selection
    pub spec: Option<String>,

    /// Print the run-time environment instead of the build-time one
    #[arg(long)]
    pub run: bool,
}

#[derive(Args)]
pub struct DepsArgs {
    #[command(flatten)]
    pub select: SelectArgs,

    /// Selection
    pub spec: Option<String>,

    /// Emit Graphviz instead of a list
    #[arg(long)]
    pub dot: bool,

    /// Only list dependencies needed in this phase (build, link or run)
    #[arg(long = "type", value_name = "LINKAGE", conflicts_with = "dot")]
    pub linkage: Option<Linkage>,
}

#[derive(Args)]
pub struct VariantsArgs {
    /// Package descriptor
    pub descriptor: PathBuf,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Package descriptor
    pub descriptor: PathBuf,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

fn parse_prefix(s: &str) -> Result<(String, PathBuf), String> {
    match s.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => {
            Ok((name.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected NAME=PATH, got `{}`", s)),
    }
}
