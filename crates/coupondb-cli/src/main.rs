mod runs;
mod scrape;

use clap::{Parser, Subcommand};
use coupondb_core::{Category, MerchantDomain};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "coupondb-cli")]
#[command(about = "Coupon scraping pipeline command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sweep merchant categories and persist every revealed coupon
    Sweep {
        /// Restrict the sweep to these categories (repeatable; `a`..`z` or `other`)
        #[arg(long = "category")]
        categories: Vec<Category>,
        /// List merchants per category without scraping offers or writing
        #[arg(long)]
        dry_run: bool,
    },
    /// Scrape a single merchant domain
    Scrape {
        /// Merchant domain, e.g. `acme.com`
        domain: MerchantDomain,
        /// Print the normalized coupons as JSON instead of persisting them
        #[arg(long)]
        dry_run: bool,
    },
    /// Show recent scrape runs
    Runs {
        /// Maximum number of runs to show
        #[arg(long, default_value = "20")]
        limit: i64,
    },
    /// Database operations
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Verify the database is reachable
    Ping,
    /// Apply pending migrations
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = coupondb_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Some(Commands::Sweep {
            categories,
            dry_run,
        }) => {
            let categories = if categories.is_empty() {
                config.scrape.categories.clone()
            } else {
                categories
            };
            if dry_run {
                scrape::run_sweep_dry_run(&config, &categories).await
            } else {
                let pool = coupondb_db::connect_pool_from_config(&config).await?;
                scrape::run_sweep(&pool, &config, &categories).await
            }
        }
        Some(Commands::Scrape { domain, dry_run }) => {
            if dry_run {
                scrape::run_scrape_dry_run(&config, &domain).await
            } else {
                let pool = coupondb_db::connect_pool_from_config(&config).await?;
                scrape::run_scrape(&pool, &config, &domain).await
            }
        }
        Some(Commands::Runs { limit }) => {
            let pool = coupondb_db::connect_pool_from_config(&config).await?;
            runs::run_list_runs(&pool, limit).await
        }
        Some(Commands::Db { command }) => {
            let pool = coupondb_db::connect_pool_from_config(&config).await?;
            match command {
                DbCommands::Ping => {
                    coupondb_db::health_check(&pool).await?;
                    println!("database ok");
                }
                DbCommands::Migrate => {
                    let applied = coupondb_db::run_migrations(&pool).await?;
                    println!("applied {applied} migration(s)");
                }
            }
            Ok(())
        }
        None => {
            println!("no command given; run `coupondb-cli --help` for usage");
            Ok(())
        }
    }
}
