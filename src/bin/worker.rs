use std::env;

use anyhow::Context;
use dealsync::config::AppConfig;
use dealsync::init_tracing;
use dealsync::jobs::{run_deal_extraction, LoadMode};
use dealsync::store::{self, PostgresConnector, StoreConnector};
use migration::{Migrator, MigratorTrait};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;

    // Command-line flags
    let args: Vec<String> = env::args().collect();
    let streaming = args.iter().any(|a| a == "--stream");
    let migrate = args.iter().any(|a| a == "--migrate");
    let no_delay = args.iter().any(|a| a == "--no-delay");

    info!("Starting HubSpot Deals extraction service run.");

    // Gives a freshly started database container time to accept connections.
    if !no_delay && !config.extraction.startup_delay.is_zero() {
        info!("Waiting for {} seconds...", config.extraction.startup_delay.as_secs());
        tokio::time::sleep(config.extraction.startup_delay).await;
    }

    if migrate {
        let connector = PostgresConnector::new(config.database.clone());
        let db = match connector.connect().await {
            Ok(db) => db,
            Err(e) => {
                error!(?e, "failed to connect to database for migrations");
                return Ok(());
            }
        };
        let applied = Migrator::up(&db, None).await;
        store::release(db).await;
        if let Err(e) = applied {
            error!(?e, "failed to apply migrations");
            return Ok(());
        }
        info!("Migrations applied");
    }

    let mode = if streaming { LoadMode::Streaming } else { LoadMode::Eager };
    match run_deal_extraction(&config, mode).await {
        Ok(summary) => info!(
            fetched = summary.fetched,
            written = summary.written,
            "Extraction service has finished its run."
        ),
        Err(e) => error!(?e, "deal extraction failed"),
    }

    Ok(())
}
