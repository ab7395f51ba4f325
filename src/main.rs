use anyhow::Result;
use clap::Parser;
use litrun::cli::{Cli, Commands};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();
    let verbosity = cli.verbosity();

    // Initialize logging with verbosity-aware level; logs go to stderr so
    // stdout stays clean for annotated output.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| verbosity.to_log_level().to_string().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Run(args) => {
            litrun::cli::commands::run(args).await?;
        }
        Commands::Check(args) => {
            litrun::cli::commands::check(args)?;
        }
    }

    Ok(())
}
