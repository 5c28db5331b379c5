use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use mercurius_cli::export::write_listings;
use mercurius_cli::{Command, Config, ExportFormat};
use mercurius_client::{HubSpotClient, ListingsClient};
use mercurius_core::{load_settings, AppError, Settings, SyncService};
use mercurius_db::ListingRepository;

#[tokio::main]
async fn main() {
    // Load environment variables from .env file
    dotenv().ok();

    // Setup logging (stderr to keep stdout clean for exports)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::parse();

    if let Err(e) = run(config).await {
        match e.downcast_ref::<AppError>() {
            Some(app_err) => eprintln!("Error: {}", app_err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let settings = load_settings(config.config.as_deref())?;

    // Database connection
    info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    let repo = ListingRepository::new(pool);

    match &config.command {
        Command::Sync => sync(&config, &settings, repo).await?,
        Command::Migrate => {
            repo.migrate().await?;
            info!("Migrations applied");
        }
        Command::List {
            format,
            status,
            limit,
        } => list(&repo, *format, status.as_deref(), *limit).await?,
        Command::Stats => show_stats(&repo).await?,
    }

    Ok(())
}

/// Run one listing/deal synchronization
async fn sync(config: &Config, settings: &Settings, repo: ListingRepository) -> anyhow::Result<()> {
    let listings = ListingsClient::new(&settings.listings.base_url, &settings.http)?;

    let crm = config.crm_config();
    let deals = HubSpotClient::from_config(&crm, &settings.crm, &settings.http)?;
    if deals.is_none() {
        warn!("HUBSPOT_ACCESS_TOKEN not set, CRM sync disabled");
    }

    let service = SyncService::new(listings, repo, deals);
    let report = service.sync().await?;

    if report.fetch_failed {
        println!("Listings could not be fetched; nothing synced this run.");
        return Ok(());
    }

    let stats = &report.stats;
    println!(
        "Synced {} listings: {} new, {} already stored, {} deals created, {} deals already in CRM, {} skipped",
        report.fetched,
        stats.listings_created,
        stats.listings_existing,
        stats.deals_created,
        stats.deals_existing,
        stats.deals_skipped
    );

    Ok(())
}

/// Export stored listings to stdout
async fn list(
    repo: &ListingRepository,
    format: ExportFormat,
    status: Option<&str>,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let listings = repo.list_all(status, limit).await?;

    if listings.is_empty() {
        eprintln!("No listings found to export.");
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = write_listings(&mut out, &listings, format) {
        error!("Export failed: {}", e);
        return Err(e);
    }

    info!("Export complete: {} listings", listings.len());
    Ok(())
}

/// Show database statistics
async fn show_stats(repo: &ListingRepository) -> anyhow::Result<()> {
    let stats = repo.get_stats().await?;

    println!("\nListing Statistics\n");
    println!("  Total listings:        {}", stats.total_listings);
    for entry in &stats.by_status {
        println!("  {:<22} {}", format!("{}:", entry.status), entry.count);
    }
    if let Some(last_created) = stats.last_created {
        println!("  Last new listing:      {}", last_created);
    }
    println!();

    Ok(())
}
