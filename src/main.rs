mod cli;

use clap::Parser;
use dotenvy::dotenv;
use pocketbook::{
    config::{app::load_default_config, database},
    core::{Ledger, Session},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    // 2. Load .env before clap reads POCKETBOOK_USER
    dotenv().ok();

    let cli = cli::Cli::parse();
    let session = Session::new(cli.user)?;

    // 3. Load the application configuration
    let config = load_default_config()?;

    // 4. Open the store and make sure the tables exist
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database ready"))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Run the command
    let ledger = Ledger::new(db, config);
    cli::run(&ledger, &session, cli.command)
        .await
        .inspect_err(|e| error!("Command failed: {}", e))
}
