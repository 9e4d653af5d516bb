//! Matching engine orchestration.
//!
//! The engine composes four collaborators behind narrow traits: the presence
//! store, the capability index, the embedding provider, and the provider
//! directory. Every collaborator call is a network round trip; the traits keep
//! them injectable so the ranking logic is testable without any backend.

pub mod heartbeat;
pub mod nearby;
pub mod search;

mod error;

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc, time::Duration};

use uuid::Uuid;

use beacon_config::{Config, EmbeddingProviderConfig};
use beacon_domain::geo::GeoPoint;
use beacon_providers::embedding;
use beacon_storage::{
	db::Db,
	directory,
	models::{CapabilityHit, ProviderCard, StoredLocation},
	presence::PresenceStore,
	vector::VectorIndex,
};

pub use error::{Error, Result};
pub use heartbeat::{HeartbeatRequest, HeartbeatResponse};
pub use nearby::{NearbyCandidate, NearbyRequest, NearbyResponse};
pub use search::{Candidate, SearchRequest, SearchResponse};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	Requester,
	Provider,
}
impl std::str::FromStr for Role {
	type Err = Error;

	fn from_str(raw: &str) -> Result<Self> {
		match raw {
			"requester" => Ok(Self::Requester),
			"provider" => Ok(Self::Provider),
			_ => Err(Error::InvalidArgument { message: format!("Unknown caller role {raw:?}.") }),
		}
	}
}

/// Caller identity and role. Authentication happens upstream; the engine
/// trusts this context and enforces only the per-operation role checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerContext {
	pub caller_id: Uuid,
	pub role: Role,
}

pub trait Presence
where
	Self: Send + Sync,
{
	fn publish<'a>(&'a self, location: StoredLocation, ttl: Duration) -> BoxFuture<'a, Result<()>>;
	fn is_online<'a>(&'a self, provider_id: Uuid) -> BoxFuture<'a, Result<bool>>;
	fn online_ids<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Uuid>>>;
	fn locations<'a>(
		&'a self,
		provider_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, StoredLocation>>>;
}

pub trait CandidateIndex
where
	Self: Send + Sync,
{
	fn top_k_similar<'a>(
		&'a self,
		query_vector: &'a [f32],
		candidate_ids: &'a [Uuid],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<CapabilityHit>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait ProviderDirectory
where
	Self: Send + Sync,
{
	fn cards<'a>(&'a self, provider_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<ProviderCard>>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub presence: Arc<dyn Presence>,
	pub index: Arc<dyn CandidateIndex>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub directory: Arc<dyn ProviderDirectory>,
}
impl Collaborators {
	pub fn new(
		presence: Arc<dyn Presence>,
		index: Arc<dyn CandidateIndex>,
		embedding: Arc<dyn EmbeddingProvider>,
		directory: Arc<dyn ProviderDirectory>,
	) -> Self {
		Self { presence, index, embedding, directory }
	}

	/// Wires the production adapters around live backend handles. The fields
	/// stay swappable, so a test can keep the live stores and replace just the
	/// embedder.
	pub fn live(cfg: &Config, presence: PresenceStore, index: VectorIndex, db: Db) -> Self {
		let op_timeout = Duration::from_millis(cfg.storage.redis.op_timeout_ms);

		Self::new(
			Arc::new(LivePresence { store: presence, op_timeout }),
			Arc::new(LiveIndex { index }),
			Arc::new(LiveEmbedding),
			Arc::new(LiveDirectory { db }),
		)
	}
}

struct LivePresence {
	store: PresenceStore,
	op_timeout: Duration,
}
impl LivePresence {
	/// Caps one store round trip; a hung connection surfaces as a retryable
	/// outage instead of stalling the caller.
	async fn bounded<T>(&self, fut: impl Future<Output = beacon_storage::Result<T>>) -> Result<T> {
		match tokio::time::timeout(self.op_timeout, fut).await {
			Ok(result) => result.map_err(Error::from),
			Err(_) =>
				Err(Error::StoreUnavailable { message: "Presence store call timed out.".to_string() }),
		}
	}
}
impl Presence for LivePresence {
	fn publish<'a>(&'a self, location: StoredLocation, ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(self.bounded(self.store.publish(location, ttl)))
	}

	fn is_online<'a>(&'a self, provider_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(self.bounded(self.store.is_online(provider_id)))
	}

	fn online_ids<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(self.bounded(self.store.online_ids()))
	}

	fn locations<'a>(
		&'a self,
		provider_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, StoredLocation>>> {
		Box::pin(self.bounded(self.store.locations(provider_ids)))
	}
}

struct LiveIndex {
	index: VectorIndex,
}
impl CandidateIndex for LiveIndex {
	fn top_k_similar<'a>(
		&'a self,
		query_vector: &'a [f32],
		candidate_ids: &'a [Uuid],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<CapabilityHit>>> {
		Box::pin(async move {
			let hits = self.index.top_k_similar(query_vector, candidate_ids, k).await?;

			Ok(hits)
		})
	}
}

struct LiveEmbedding;
impl EmbeddingProvider for LiveEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			let vectors = embedding::embed(cfg, texts).await?;

			Ok(vectors)
		})
	}
}

struct LiveDirectory {
	db: Db,
}
impl ProviderDirectory for LiveDirectory {
	fn cards<'a>(&'a self, provider_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<ProviderCard>>> {
		Box::pin(async move {
			let cards = directory::provider_cards(&self.db.pool, provider_ids).await?;

			Ok(cards)
		})
	}
}

pub struct BeaconService {
	pub cfg: Config,
	pub collaborators: Collaborators,
}
impl BeaconService {
	pub fn new(cfg: Config, presence: PresenceStore, index: VectorIndex, db: Db) -> Self {
		let collaborators = Collaborators::live(&cfg, presence, index, db);

		Self { cfg, collaborators }
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		Self { cfg, collaborators }
	}

	/// Presence probe; open to any caller role.
	pub async fn is_online(&self, provider_id: Uuid) -> Result<bool> {
		self.collaborators.presence.is_online(provider_id).await
	}

	pub(crate) fn resolve_range(&self, requested: Option<f64>) -> Result<f64> {
		let range_m = requested.unwrap_or(self.cfg.matching.default_range_m);

		if !range_m.is_finite() || range_m <= 0.0 {
			return Err(Error::InvalidArgument {
				message: "range_m must be a positive number.".to_string(),
			});
		}

		Ok(range_m)
	}

	pub(crate) fn search_deadline(&self) -> Duration {
		Duration::from_millis(self.cfg.matching.search_deadline_ms)
	}
}

pub(crate) fn validate_point(lat: f64, lng: f64) -> Result<GeoPoint> {
	GeoPoint::try_new(lat, lng).map_err(|err| Error::InvalidArgument { message: err.to_string() })
}
