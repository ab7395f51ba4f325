//! Command-line interface for running snippets outside a full doc build.

pub mod commands;

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::filter::LevelFilter;

#[derive(Parser)]
#[command(
    name = "litrun",
    about = "Execute documentation code samples and annotate them with observed results",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate snippet files and print annotated output
    Run(RunArgs),
    /// Validate directives and clump structure without executing
    Check(CheckArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Snippet files, each evaluated as one sample
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Directory that scopes `require` inside snippets
    #[arg(long)]
    pub modules_root: Option<PathBuf>,

    /// Share one page state across all files, in order
    #[arg(long)]
    pub shared_page: bool,

    /// Language tag of the snippets
    #[arg(long, default_value = "lua")]
    pub lang: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}

#[derive(Args)]
pub struct CheckArgs {
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Language tag of the snippets
    #[arg(long, default_value = "lua")]
    pub lang: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    Trace,
}

impl Verbosity {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            Verbosity::Quiet => LevelFilter::ERROR,
            Verbosity::Normal => LevelFilter::WARN,
            Verbosity::Verbose => LevelFilter::DEBUG,
            Verbosity::Trace => LevelFilter::TRACE,
        }
    }
}

impl Cli {
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::Trace,
            }
        }
    }
}
