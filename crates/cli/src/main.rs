//! Ekimate CLI — the main entry point.
//!
//! Commands:
//! - `ask`    — Ask one question and print the answer
//! - `chat`   — Interactive conversation mode
//! - `doctor` — Diagnose configuration and backend health
//! - `usage`  — Show the configured remote quota limits

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "ekimate",
    about = "Ekimate — tiered in-game language companion",
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
    /// Ask a single question
    Ask {
        /// The question to ask
        message: String,

        /// The player's in-game location (e.g. "ticket_gate")
        #[arg(short, long, default_value = "ticket_gate")]
        location: String,

        /// The active game objective
        #[arg(short, long, default_value = "buy_ticket_to_odawara")]
        objective: String,
    },

    /// Chat interactively across a conversation
    Chat {
        /// The player's in-game location
        #[arg(short, long, default_value = "ticket_gate")]
        location: String,

        /// The active game objective
        #[arg(short, long, default_value = "buy_ticket_to_odawara")]
        objective: String,
    },

    /// Diagnose configuration and backend health
    Doctor,

    /// Show the configured remote quota limits
    Usage,
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
        .init();

    match cli.command {
        Commands::Ask {
            message,
            location,
            objective,
        } => commands::ask::run(message, location, objective).await?,
        Commands::Chat {
            location,
            objective,
        } => commands::chat::run(location, objective).await?,
        Commands::Doctor => commands::doctor::run().await?,
        Commands::Usage => commands::usage::run().await?,
    }

    Ok(())
}
