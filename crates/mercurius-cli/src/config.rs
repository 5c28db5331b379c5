use clap::{Parser, Subcommand, ValueEnum};
use mercurius_core::CrmConfig;
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "mercurius")]
#[command(
    author,
    version,
    about = "Mirror marketplace listings into PostgreSQL and HubSpot deals"
)]
#[command(after_help = "Examples:
  mercurius migrate
  mercurius sync
  mercurius list --format csv > listings.csv
  mercurius stats")]
pub struct Config {
    /// PostgreSQL database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// HubSpot private app access token; CRM sync is disabled when unset or blank
    #[arg(long, env = "HUBSPOT_ACCESS_TOKEN", hide_env_values = true)]
    pub hubspot_access_token: Option<String>,

    /// Custom path to the config.toml settings file
    #[arg(short, long, value_name = "PATH", env = "MERCURIUS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Config {
    /// Resolves the CRM integration from the access token.
    pub fn crm_config(&self) -> CrmConfig {
        CrmConfig::from_token(self.hubspot_access_token.clone())
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Fetch "For Sale" listings, store new ones and create missing CRM deals
    #[command(after_help = "Intended to be run by a scheduler (cron, systemd timer, ...).")]
    Sync,
    /// Apply database migrations
    Migrate,
    /// Export stored listings to stdout
    #[command(after_help = "Examples:
  mercurius list --format jsonl > listings.jsonl
  mercurius list --status \"For Sale\" --format csv")]
    List {
        /// Output format for exported data
        #[arg(short, long, default_value = "jsonl")]
        format: ExportFormat,
        /// Only listings with this exact status
        #[arg(short, long)]
        status: Option<String>,
        /// Maximum number of listings to export
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show database statistics
    Stats,
}

/// Supported export formats
#[derive(Debug, Clone, Copy, PartialEq, ValueEnum)]
pub enum ExportFormat {
    /// JSON Lines format (one JSON object per line)
    Jsonl,
    /// Standard JSON array format
    Json,
    /// CSV format (comma-separated values)
    Csv,
}
