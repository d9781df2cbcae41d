mod catalog;
mod sync;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "shelfsync-cli")]
#[command(about = "Region-scoped grocery catalog sync")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance.
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// List the retailer's pickup regions.
    Regions,
    /// List the retailer's browse departments.
    Categories,
    /// Sync the catalog for every region (or only those named).
    Sync {
        /// Region id to sync; repeatable. Defaults to all allowed regions.
        #[arg(long = "region", value_name = "ID")]
        regions: Vec<i64>,
        /// Fetch and reconcile without writing anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Search the live catalog in one or more regions.
    Search {
        term: String,
        #[arg(long = "region", value_name = "ID", required = true)]
        regions: Vec<i64>,
    },
    /// Show recent sync runs.
    Runs {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("no command given; run `shelfsync-cli --help`");
        return Ok(());
    };

    let config = shelfsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match command {
        Commands::Db { command } => {
            let pool = connect(&config).await?;
            match command {
                DbCommands::Ping => {
                    shelfsync_db::ping(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = shelfsync_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
        }
        Commands::Regions => catalog::run_regions(&config).await?,
        Commands::Categories => catalog::run_categories(&config).await?,
        Commands::Sync { regions, dry_run } => {
            let pool = connect(&config).await?;
            sync::run_sync(&config, pool, &regions, dry_run).await?;
        }
        Commands::Search { term, regions } => {
            catalog::run_search(&config, &term, &regions).await?;
        }
        Commands::Runs { limit } => {
            let pool = connect(&config).await?;
            sync::run_list_runs(&pool, limit).await?;
        }
    }

    Ok(())
}

async fn connect(config: &shelfsync_core::AppConfig) -> anyhow::Result<sqlx::PgPool> {
    let pool_config = shelfsync_db::PoolConfig::from_app_config(config);
    let pool = shelfsync_db::connect_pool(&config.database_url, pool_config).await?;
    Ok(pool)
}

/// Cancels the returned token on ctrl-c.
fn cancel_on_ctrl_c() -> tokio_util::sync::CancellationToken {
    let token = tokio_util::sync::CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("ctrl-c received, cancelling");
            trigger.cancel();
        }
    });
    token
}
