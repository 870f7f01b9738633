//! docforge CLI: the main entry point.
//!
//! Commands:
//! - `init`   Write a default config file
//! - `serve`  Start the HTTP gateway
//! - `chat`   Interactive session with one bot
//! - `parse`  Run the section parser over stdin

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "docforge",
    about = "docforge: documents kept up to date by a language model",
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
    /// Write a default configuration file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Chat with a bot in a local session
    Chat {
        /// Bot variant (defaults to `bot` from the config)
        #[arg(short, long)]
        bot: Option<String>,
    },

    /// Parse a model response read from stdin and print the sections as JSON
    Parse {
        /// Bot variant whose schema drives the parser
        #[arg(short, long)]
        bot: Option<String>,

        /// Parse as a query response instead of a command response
        #[arg(long)]
        query: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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
        Commands::Init { force } => commands::init::run(force)?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Chat { bot } => commands::chat::run(bot).await?,
        Commands::Parse { bot, query } => commands::parse::run(bot, query).await?,
    }

    Ok(())
}
