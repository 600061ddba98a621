use std::sync::Arc;

use campaign_ledger::account::{AccountService, DefaultGrantPolicy};
use campaign_ledger::config::AppConfig;
use campaign_ledger::db::Database;
use campaign_ledger::logging::init_logging;
use campaign_ledger::settlement::{SettlementEngine, SettlementQueue, SettlementWorker, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path =
        std::env::var("LEDGER_CONFIG").unwrap_or_else(|_| "config/ledger.yaml".to_string());
    let config = AppConfig::load(&config_path)?;
    let _guard = init_logging(&config);

    tracing::info!(path = %config_path, "Starting campaign ledger settlement service");

    let db = Database::connect(&config.postgres_url, &config.db).await?;
    db.health_check().await?;
    campaign_ledger::schema::init_schema(db.pool()).await?;
    tracing::info!("Database connection established");

    let pool = db.pool().clone();
    let accounts = Arc::new(AccountService::new(
        pool.clone(),
        Arc::new(DefaultGrantPolicy),
    ));
    let engine = Arc::new(SettlementEngine::new(pool.clone(), accounts));
    let queue = SettlementQueue::new(pool);
    let worker = SettlementWorker::new(queue, engine, WorkerConfig::from(&config.settlement_worker));

    worker
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
        })
        .await;

    tracing::info!("Campaign ledger settlement service stopped");
    Ok(())
}
