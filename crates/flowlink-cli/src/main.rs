mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "flowlink",
    version,
    about = "Sync-run orchestration for the Flowlink data platform"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP run entrypoint
    Serve,
    /// Dispatch a sync run directly
    Run {
        /// Workspace the sync belongs to
        workspace: String,
        /// Sync link id
        sync: String,
        /// Discard checkpoint state and replicate from scratch
        #[arg(long)]
        full_sync: bool,
    },
    /// Inspect or reset checkpoint state
    State {
        #[command(subcommand)]
        command: StateCommands,
    },
    /// Manage captured catalogs
    Catalog {
        #[command(subcommand)]
        command: CatalogCommands,
    },
}

#[derive(Subcommand)]
enum StateCommands {
    /// Print the decoded checkpoint state for a sync
    Show { sync: String },
    /// Delete all checkpoint rows for a sync
    Clear { sync: String },
}

#[derive(Subcommand)]
enum CatalogCommands {
    /// Load a captured catalog JSON file for a (key, package, version) triple
    Import {
        storage_key: String,
        package: String,
        version: String,
        /// Path to the catalog JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Serve => commands::serve::execute().await,
        Commands::Run {
            workspace,
            sync,
            full_sync,
        } => commands::run::execute(&workspace, &sync, full_sync).await,
        Commands::State { command } => match command {
            StateCommands::Show { sync } => commands::state::show(&sync),
            StateCommands::Clear { sync } => commands::state::clear(&sync),
        },
        Commands::Catalog { command } => match command {
            CatalogCommands::Import {
                storage_key,
                package,
                version,
                file,
            } => commands::catalog::import(&storage_key, &package, &version, &file),
        },
    }
}
