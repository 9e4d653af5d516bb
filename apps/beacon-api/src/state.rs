use std::sync::Arc;

use beacon_service::BeaconService;
use beacon_storage::{db::Db, presence::PresenceStore, vector::VectorIndex};

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<BeaconService>,
}
impl AppState {
	pub async fn new(config: beacon_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		let index = VectorIndex::new(&config.storage.qdrant)?;

		index.ensure_collection().await?;

		let presence = PresenceStore::connect(&config.storage.redis, config.presence.scan_count).await?;
		let service = BeaconService::new(config, presence, index, db);

		Ok(Self { service: Arc::new(service) })
	}
}
