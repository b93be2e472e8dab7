use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "trailstack")]
#[command(version)]
#[command(about = "Deploy, inventory, and tear down the audit-logging foundation stack", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: <config dir>/trailstack/config.json)
    #[arg(long, global = true, env = "TRAILSTACK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log as JSON lines instead of human-readable text
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or update the stack, then verify and publish its outputs
    Apply(ApplyArgs),

    /// Delete the stack and its published outputs
    Destroy(DestroyArgs),

    /// Show stack status, drift, and published outputs
    #[command(alias = "list")]
    Inventory(InventoryArgs),

    /// Run prerequisite checks only
    Check,

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Delete and recreate a stack stuck in a failed state
    #[arg(long)]
    pub auto_recover: bool,
}

#[derive(Debug, Args)]
pub struct DestroyArgs {
    /// Also remove the retained log bucket (asks for DELETE BUCKET)
    #[arg(long)]
    pub delete_bucket: bool,
}

#[derive(Debug, Args)]
pub struct InventoryArgs {
    /// Print the inventory as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the effective configuration (credentials redacted)
    Show,

    /// Write a starter config file
    Init {
        /// AWS region
        #[arg(long, env = "AWS_REGION")]
        region: String,

        /// Environment name, e.g. prod
        #[arg(long)]
        environment: String,

        /// Named AWS profile; the default credential chain is used otherwise
        #[arg(long)]
        profile: Option<String>,

        /// Pin the 12-digit account id credentials must belong to
        #[arg(long)]
        account_id: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
