use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mandi_price_sync::config::AppConfig;
use mandi_price_sync::handlers;
use mandi_price_sync::jobs::mandi_price_sync::start_mandi_price_sync_job;
use mandi_price_sync::services::data_gov::DataGovService;
use mandi_price_sync::services::mandi_sync::MandiSyncService;
use mandi_price_sync::services::price_cache::new_price_cache;
use mandi_price_sync::services::price_store::SeaOrmPriceStore;
use mandi_price_sync::AppState;

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

    let config = AppConfig::from_env()?;
    tracing::info!(
        priority_states = ?config.priority_states.states(),
        "Loaded priority states"
    );

    // Connect to database
    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None).await?;

    let feed = DataGovService::new(config.upstream.clone())?;
    let store = SeaOrmPriceStore::new(db.clone());
    let sync = Arc::new(
        MandiSyncService::new(Arc::new(feed), Arc::new(store), config.priority_states.clone())
            .with_retention_days(config.retention_days),
    );
    let cache = new_price_cache();

    start_mandi_price_sync_job(
        db.clone(),
        sync.clone(),
        cache.clone(),
        config.sync_interval_secs,
        config.sync_on_startup,
    )
    .await;

    if config.trigger_token.is_none() {
        tracing::warn!("SYNC_TRIGGER_TOKEN not set - manual sync endpoint is unauthenticated");
    }

    let state = AppState {
        db,
        sync,
        cache,
        trigger_token: config.trigger_token.clone(),
        sync_interval_secs: config.sync_interval_secs,
    };

    let app = handlers::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
