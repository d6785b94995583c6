use clap::{Parser, Subcommand};
use migrations::Migrator;
use sea_orm_migration::MigratorTrait;
use tracing::{error, info};

use storefront_api::{config, db};

/// Apply or roll back the storefront schema
#[derive(Parser)]
#[command(name = "migration", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Apply pending migrations (default)
    Up,
    /// Roll back the last `steps` migrations
    Down {
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
    /// Show applied and pending migrations
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config()?;
    config::init_tracing(cfg.log_level(), cfg.log_json);

    info!("Starting database migration");
    let pool = db::establish_connection_from_app_config(&cfg).await?;

    let result = match cli.command.unwrap_or(Command::Up) {
        Command::Up => db::run_migrations(&pool).await.map_err(anyhow::Error::from),
        Command::Down { steps } => Migrator::down(&pool, Some(steps))
            .await
            .map_err(anyhow::Error::from),
        Command::Status => Migrator::status(&pool).await.map_err(anyhow::Error::from),
    };

    if let Err(e) = &result {
        error!("Migration failed: {}", e);
    } else {
        info!("Migration completed successfully");
    }
    result
}
