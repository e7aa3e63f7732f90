use pocket_ledger::{
    config::{database, settings},
    core::{Ledger, scheduler::DailySummaryScheduler},
    errors::Result,
};
use dotenvy::dotenv;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the application configuration
    let app_config = settings::load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;
    info!(
        timezone = %app_config.timezone,
        daily_summary_cron = %app_config.daily_summary_cron,
        "Configuration loaded."
    );

    // 4. Connect and make sure the schema exists
    ensure_sqlite_dir(&app_config.database_url)?;
    let db = database::create_connection(&app_config.database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|()| info!("Database schema ready."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Start the daily summary job
    let ledger = Ledger::new(db, &app_config)?;
    let scheduler = DailySummaryScheduler::from_config(ledger, &app_config)?;
    let job = tokio::spawn(async move { scheduler.run().await });

    // 6. Run until interrupted
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, stopping.");
    job.abort();

    Ok(())
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_sqlite_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = rest.split('?').next().unwrap_or(rest);
    if let Some(parent) = Path::new(file).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}
