//! yugent CLI: the main entry point.
//!
//! Commands:
//! - `chat`      Interactive chat or single-message mode
//! - `schema`    Print the tool parameters derived from a declaration file
//! - `providers` List the built-in provider presets

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "yugent",
    about = "yugent, a minimal tool-calling agent runtime",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the model
    Chat(commands::chat::ChatArgs),

    /// Derive tool parameters from an interface declaration
    Schema {
        /// File holding an `interface` or object `type` declaration
        file: std::path::PathBuf,
    },

    /// List built-in provider presets
    Providers,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Chat(args) => commands::chat::run(args).await?,
        Commands::Schema { file } => commands::schema::run(&file)?,
        Commands::Providers => commands::providers::run(),
    }

    Ok(())
}
