use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use clap::{Parser, Subcommand};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use incident_history_consolidator::{consolidate, db, report};

#[derive(Parser)]
#[command(name = "incident-history-consolidator")]
#[command(about = "Historical consolidation batch for the incident backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load a small demo incident set
    Seed,
    /// Import incidents from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Consolidate raw incidents into one summary row per product and date
    Consolidate {
        /// Emit the run outcome as JSON instead of plain text
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown coverage report over the summary table
    Report {
        #[arg(long)]
        product: Option<String>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "incident_history_consolidator=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must point at the incident database")?;

    let options = SqliteConnectOptions::from_str(&database_url)
        .context("invalid DATABASE_URL")?
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("failed to open the incident database")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let inserted = db::import_csv(&pool, &csv).await?;
            println!("Inserted {inserted} incidents from {}.", csv.display());
        }
        Commands::Consolidate { json } => {
            let outcome = consolidate::run(&pool).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!(
                    "Consolidation complete: {} created, {} skipped, {} failed.",
                    outcome.created.len(),
                    outcome.skipped,
                    outcome.failed.len()
                );
                for failed in &outcome.failed {
                    match failed.summary_date {
                        Some(date) => {
                            println!("- failed {} {}: {}", failed.product_id, date, failed.reason);
                        }
                        None => println!("- failed {}: {}", failed.product_id, failed.reason),
                    }
                }
            }

            if outcome.has_failures() {
                std::process::exit(1);
            }
        }
        Commands::Report { product, out } => {
            let summaries = db::fetch_summaries(&pool, product.as_deref()).await?;
            let report = report::build_report(product.as_deref(), &summaries);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
