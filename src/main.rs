use anyhow::Result;
use clap::{Parser, Subcommand};
use ranklist::config::Config;
use ranklist::infra::RateLimiterAdapter;
use ranklist::rate_limiter::{KeyedRateLimiter, Limits};
use ranklist::server::{self, AppState};
use ranklist::storage::Storage;
use ranklist::{logging, metrics};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "ranklist")]
#[command(about = "Ranked-list projects with per-category ordering")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP action surface
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Apply database migrations
    Migrate,
}

#[cfg(feature = "db")]
async fn open_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    let storage = ranklist::storage::DatabaseStorage::new(&config.database).await?;
    tracing::info!("Using libSQL storage at {}", config.database.url);
    Ok(Arc::new(storage))
}

#[cfg(not(feature = "db"))]
async fn open_storage(_config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::warn!("Built without the `db` feature; data lives in memory and is lost on exit");
    Ok(Arc::new(ranklist::storage::InMemoryStorage::new()))
}

#[cfg(feature = "db")]
async fn migrate(config: &Config) -> Result<()> {
    let manager = ranklist::db::DatabaseManager::new(&config.database).await?;
    manager.run_migrations().await?;
    tracing::info!("Migrations applied to {}", config.database.url);
    Ok(())
}

#[cfg(not(feature = "db"))]
async fn migrate(_config: &Config) -> Result<()> {
    anyhow::bail!("`migrate` requires building with `--features db`")
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let _guard = logging::init_logging();

    let cli = Cli::parse();
    let config = Config::load()?;

    match cli.command {
        Commands::Serve { port } => {
            if config.metrics.enabled {
                metrics::init_metrics(config.metrics.port);
            }

            let limiter = KeyedRateLimiter::new(Limits {
                requests_per_min: config.rate_limit.requests_per_min,
                burst: config.rate_limit.burst,
            });
            let state = AppState {
                storage: open_storage(&config).await?,
                rate_limiter: Arc::new(RateLimiterAdapter(limiter)),
                category_match: config.reconcile.category_match,
            };

            server::start_server(state, port.unwrap_or(config.server.port)).await?;
        }
        Commands::Migrate => migrate(&config).await?,
    }

    Ok(())
}
