//! whis - household inventory service with backup and restore.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;
use whis::inventory::OwnerId;

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "whis")]
#[command(version, about = "Household inventory service with backup and restore")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API server
    Serve {
        /// Config file (default: ~/.whis/whis.toml if present)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Bind address, overrides the config file
        #[arg(long)]
        host: Option<String>,
        /// Port, overrides the config file
        #[arg(short, long)]
        port: Option<u16>,
        /// Data directory, overrides the config file
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Manage an owner's backups directly
    Backup {
        /// Config file (default: ~/.whis/whis.toml if present)
        #[arg(short, long, global = true)]
        config: Option<PathBuf>,
        /// Data directory, overrides the config file
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
        #[command(subcommand)]
        action: BackupAction,
    },
}

#[derive(Subcommand)]
pub enum BackupAction {
    /// Create a backup of the owner's whole inventory
    Create {
        #[arg(long)]
        owner: OwnerId,
    },
    /// List the owner's completed backups, newest first
    List {
        #[arg(long)]
        owner: OwnerId,
    },
    /// Replace the owner's inventory with the contents of a backup
    Restore {
        #[arg(long)]
        owner: OwnerId,
        /// Backup id
        #[arg(long)]
        id: Uuid,
    },
    /// Delete a backup and its archive
    Delete {
        #[arg(long)]
        owner: OwnerId,
        /// Backup id
        #[arg(long)]
        id: Uuid,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve {
            config,
            host,
            port,
            data_dir,
        } => commands::serve::execute(config, host, port, data_dir).await,
        Commands::Backup {
            config,
            data_dir,
            action,
        } => commands::backup::execute(config, data_dir, action),
    };

    if let Err(e) = result {
        ui::print_error_box("whis failed", &e);
        std::process::exit(1);
    }
}
