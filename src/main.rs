//! Mini ORM - Migration command line tool.
//!
//! Applies or inspects a directory of ordered `.sql` migrations against a SQLite,
//! PostgreSQL or MySQL database.

use mini_orm::config::{Commands, Config};
use mini_orm::migration::{MigrationEngine, SqlDirectory};
use mini_orm::{Database, OrmError};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

async fn run(config: &Config) -> Result<(), OrmError> {
    let settings = config.database_settings()?;
    info!(
        db_type = %settings.db_type,
        url = %settings.masked_url(),
        "Starting mini-orm v{}",
        env!("CARGO_PKG_VERSION")
    );

    let db = Database::connect(&settings).await?;
    let engine = MigrationEngine::new(db.executor().clone())
        .with_collection(SqlDirectory::new(config.migrations_dir()));

    let result = match &config.command {
        Commands::Migrate { .. } => engine.run().await.map(|report| {
            println!("state:    {}", report.state);
            println!(
                "previous: {}",
                report.previous_version.as_deref().unwrap_or("(none)")
            );
            println!(
                "current:  {}",
                report.current_version.as_deref().unwrap_or("(none)")
            );
            println!("applied:  {}", report.applied.len());
            for id in &report.applied {
                println!("  {}", id);
            }
        }),
        Commands::Status { .. } => engine.status().await.map(|status| {
            println!("state:    {}", status.state);
            println!(
                "current:  {}",
                status.current_version.as_deref().unwrap_or("(none)")
            );
            println!("pending:  {}", status.pending.len());
            for id in &status.pending {
                println!("  {}", id);
            }
        }),
    };

    db.close().await;
    result
}

#[tokio::main]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse_args();

    // Initialize logging
    init_tracing(&config);

    if let Err(e) = run(&config).await {
        error!(error = %e, "Migration command failed");
        eprintln!("Error: {}", e);
        if let Some(suggestion) = e.suggestion() {
            eprintln!("Hint: {}", suggestion);
        }
        std::process::exit(1);
    }
}
