use chrono::Utc;
use fulfillment::executable_utils::{initialize_executable, initialize_tracing};
use fulfillment::queue::{PgmqQueue, QueueName};
use fulfillment::rewards::RewardsProcessor;
use std::sync::Arc;
use std::time::Duration;
use store::memberships::MembershipService;
use store::storage::{StoreStorage, ensure_schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = initialize_executable()?;
    initialize_tracing(&config.worker.log_level);

    let storage = Arc::new(StoreStorage::connect(&config.common.database_url).await?);
    ensure_schema(&storage.db).await?;
    let queue = Arc::new(PgmqQueue::new(&config.common.database_url, QueueName::Rewards).await?);

    // Membership expiry housekeeping runs on its own timer next to the
    // rewards loop.
    let memberships = MembershipService::new(storage.db.clone());
    let sweep_secs = config.worker.expiry_sweep_secs;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(sweep_secs.max(1)));
        loop {
            ticker.tick().await;
            if let Err(e) = memberships.expire_due(Utc::now().naive_utc()).await {
                tracing::error!(error = %e, "membership expiry sweep failed");
            }
        }
    });

    let processor = RewardsProcessor::new(
        queue,
        storage.clone(),
        storage.clone(),
        storage.clone(),
        storage.clone(),
    );
    processor.run(config.worker.sleep_ms).await;
    Ok(())
}
