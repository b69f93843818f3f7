use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

use commands::{
    CompactCommand, ConfigCommand, PendingCommand, QuarantineCommand, RunCommand, SaveCommand,
    StatusCommand, SyncCommand,
};
use lockin::{Config, Engine};

#[derive(Parser)]
#[command(name = "lockin")]
#[command(version)]
#[command(about = "Offline-first workout and nutrition capture", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a workout or nutrition log
    Save(SaveCommand),

    /// List records waiting to be synced
    Pending(PendingCommand),

    /// Show per-kind sync counts
    Status(StatusCommand),

    /// Run a sync pass now
    Sync(SyncCommand),

    /// Run the background scheduler until interrupted
    Run(RunCommand),

    /// Inspect and requeue quarantined records
    Quarantine(QuarantineCommand),

    /// Delete old synced records
    Compact(CompactCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lockin=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let command = match cli.command {
        Some(Commands::Config(cmd)) => return cmd.run(&config),
        Some(command) => command,
        None => {
            println!("Use --help to see available commands");
            return Ok(());
        }
    };

    let engine = Engine::open(&config).await?;

    let result = match command {
        Commands::Save(cmd) => cmd.run(&engine, &config).await,
        Commands::Pending(cmd) => cmd.run(&engine).await,
        Commands::Status(cmd) => cmd.run(&engine).await,
        Commands::Sync(cmd) => cmd.run(&engine).await,
        Commands::Run(cmd) => cmd.run(&engine).await,
        Commands::Quarantine(cmd) => cmd.run(&engine).await,
        Commands::Compact(cmd) => cmd.run(&engine).await,
        Commands::Config(_) => Ok(()),
    };

    engine.close().await;
    result
}
