use chrono::{Duration, NaiveDate};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mandi_price_sync::config::{PriorityStates, UpstreamConfig};
use mandi_price_sync::services::data_gov::DataGovService;
use mandi_price_sync::services::mandi_sync::MandiSyncService;
use mandi_price_sync::services::normalize::parse_date;
use mandi_price_sync::services::price_store::{MemoryPriceStore, PriceStore, SeaOrmPriceStore};
use mandi_price_sync::services::sync_status::{self, jobs};

const USAGE: &str = "\
Usage: cargo run --bin mandi_price_backfill [--dry-run] <from-date> [to-date]
Requires DATA_GOV_API_KEY, PRIORITY_STATES or PRIORITY_STATES_FILE, and DATABASE_URL (unless --dry-run)";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mandi_price_sync=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().skip(1).collect();
    let dry_run = args.iter().any(|a| a == "--dry-run");
    let dates: Vec<&String> = args.iter().filter(|a| !a.starts_with("--")).collect();

    let Some(from_raw) = dates.first() else {
        eprintln!("{}", USAGE);
        eprintln!("Example: cargo run --bin mandi_price_backfill 2024-01-01 2024-01-07");
        std::process::exit(1);
    };

    let from = parse_date(from_raw)?;
    let to = match dates.get(1) {
        Some(raw) => parse_date(raw)?,
        None => from,
    };
    if to < from {
        eprintln!("to-date {} is before from-date {}", to, from);
        std::process::exit(1);
    }

    let feed = Arc::new(DataGovService::new(UpstreamConfig::from_env()?)?);
    let priority_states = PriorityStates::from_env()?;

    // Dry runs validate the feed without touching the database
    let store: Arc<dyn PriceStore>;
    let db;
    if dry_run {
        tracing::info!("DRY RUN: records are kept in memory only");
        store = Arc::new(MemoryPriceStore::new());
        db = None;
    } else {
        let database_url = env::var("DATABASE_URL")?;
        tracing::info!("Connecting to database...");
        let conn = Database::connect(&database_url).await?;
        migration::Migrator::up(&conn, None).await?;
        store = Arc::new(SeaOrmPriceStore::new(conn.clone()));
        db = Some(conn);
    }

    let sync = MandiSyncService::new(feed, store, priority_states);

    tracing::info!("🚀 Starting mandi price backfill {} → {}", from, to);

    let mut failed_days: Vec<NaiveDate> = Vec::new();
    let mut date = from;
    while date <= to {
        let result = sync.run(Some(date)).await.and_then(|summary| {
            if summary.all_writes_failed() {
                Err(summary.persistence_failure())
            } else {
                Ok(summary)
            }
        });
        match result {
            Ok(summary) => {
                println!(
                    "{}  fetched={} written={} rejected={} write_failed={}",
                    date, summary.fetched, summary.written, summary.rejected, summary.write_failed
                );
                if let Some(db) = &db {
                    if let Err(e) =
                        sync_status::record_success(db, jobs::MANDI_PRICE_SYNC_MANUAL, 0, &summary)
                            .await
                    {
                        tracing::warn!(error = %e, "Failed to record sync success");
                    }
                }
            }
            Err(e) => {
                tracing::error!("❌ Backfill failed for {}: {}", date, e);
                if let Some(db) = &db {
                    if let Err(e2) = sync_status::record_failure(
                        db,
                        jobs::MANDI_PRICE_SYNC_MANUAL,
                        &e.to_string(),
                        0,
                    )
                    .await
                    {
                        tracing::warn!(error = %e2, "Failed to record sync failure");
                    }
                }
                failed_days.push(date);
            }
        }
        date = date + Duration::days(1);
    }

    if failed_days.is_empty() {
        tracing::info!("✅ Backfill complete");
        Ok(())
    } else {
        Err(format!("backfill failed for {} day(s): {:?}", failed_days.len(), failed_days).into())
    }
}
