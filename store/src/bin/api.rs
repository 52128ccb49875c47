use fulfillment::executable_utils::{initialize_executable, initialize_tracing, serve};
use fulfillment::queue::{PgmqQueue, QueueName};
use std::sync::Arc;
use store::api::{AppState, router};
use store::proofs::FsProofStore;
use store::storage::{StoreStorage, ensure_schema};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = initialize_executable()?;
    initialize_tracing(&config.api.log_level);

    let storage = StoreStorage::connect(&config.common.database_url).await?;
    ensure_schema(&storage.db).await?;

    let proofs = Arc::new(FsProofStore::new(
        config.api.upload_dir.as_str(),
        config.api.public_base_url.clone(),
    ));
    let queue = Arc::new(PgmqQueue::new(&config.common.database_url, QueueName::Rewards).await?);

    let state = AppState::new(storage.db, proofs, queue, config.api.upi_vpa.clone());
    let app = router(state, &config.api.cors_origin);
    serve(app, &config.api.server_address).await
}
