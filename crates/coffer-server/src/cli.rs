use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "coffer", version)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create the shared tables.
    Migrate,
    /// Register a tenant and create its schema.
    ProvisionTenant {
        #[arg(long)]
        name: String,
    },
    /// Report folder closure rows that disagree with the folder tree.
    VerifyHierarchy {
        #[arg(long)]
        tenant: Uuid,
    },
}
