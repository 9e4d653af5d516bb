//! In-memory collaborator doubles for engine tests. They honor the same
//! contracts the live adapters do, with hooks to simulate expiry, races, and
//! outages deterministically.

use std::{
	cmp::Ordering as CmpOrdering,
	collections::HashMap,
	sync::{
		Mutex, MutexGuard,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use uuid::Uuid;

use beacon_config::EmbeddingProviderConfig;
use beacon_service::{
	BoxFuture, CandidateIndex, EmbeddingProvider, Error, Presence, ProviderDirectory, Result,
};
use beacon_storage::models::{CapabilityHit, ProviderCard, StoredLocation};

/// Presence store double with a manually advanced clock, so TTL expiry is
/// testable without real waiting.
pub struct MemoryPresence {
	state: Mutex<MemoryState>,
}

struct MemoryState {
	now_ms: u64,
	unavailable: bool,
	entries: HashMap<Uuid, MemoryEntry>,
}

struct MemoryEntry {
	location: Option<StoredLocation>,
	expires_at_ms: u64,
}

impl MemoryPresence {
	pub fn new() -> Self {
		Self {
			state: Mutex::new(MemoryState {
				now_ms: 0,
				unavailable: false,
				entries: HashMap::new(),
			}),
		}
	}

	/// Moves the fake clock forward. Entries whose lifetime has passed become
	/// invisible to every read, exactly like a real expiry.
	pub fn advance(&self, delta: Duration) {
		self.lock().now_ms += delta.as_millis() as u64;
	}

	/// Simulates the scan/read race: the online marker stays live while the
	/// location payload reads as absent.
	pub fn forget_location(&self, provider_id: Uuid) {
		if let Some(entry) = self.lock().entries.get_mut(&provider_id) {
			entry.location = None;
		}
	}

	/// Makes every subsequent call fail as a store outage.
	pub fn set_unavailable(&self, unavailable: bool) {
		self.lock().unavailable = unavailable;
	}

	pub fn live_count(&self) -> usize {
		let state = self.lock();

		state.entries.values().filter(|entry| entry.expires_at_ms > state.now_ms).count()
	}

	fn lock(&self) -> MutexGuard<'_, MemoryState> {
		self.state.lock().unwrap_or_else(|err| err.into_inner())
	}

	fn check_available(&self) -> Result<()> {
		if self.lock().unavailable {
			return Err(Error::StoreUnavailable { message: "Simulated outage.".to_string() });
		}

		Ok(())
	}
}
impl Default for MemoryPresence {
	fn default() -> Self {
		Self::new()
	}
}
impl Presence for MemoryPresence {
	fn publish<'a>(&'a self, location: StoredLocation, ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check_available()?;

			let mut state = self.lock();
			let expires_at_ms = state.now_ms + ttl.as_millis() as u64;

			state
				.entries
				.insert(location.provider_id, MemoryEntry { location: Some(location), expires_at_ms });

			Ok(())
		})
	}

	fn is_online<'a>(&'a self, provider_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			self.check_available()?;

			let state = self.lock();

			Ok(state
				.entries
				.get(&provider_id)
				.is_some_and(|entry| entry.expires_at_ms > state.now_ms))
		})
	}

	fn online_ids<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			self.check_available()?;

			let state = self.lock();
			let mut ids: Vec<Uuid> = state
				.entries
				.iter()
				.filter(|(_, entry)| entry.expires_at_ms > state.now_ms)
				.map(|(id, _)| *id)
				.collect();

			// Stable order keeps assertion output readable.
			ids.sort();

			Ok(ids)
		})
	}

	fn locations<'a>(
		&'a self,
		provider_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, StoredLocation>>> {
		Box::pin(async move {
			self.check_available()?;

			let state = self.lock();
			let mut map = HashMap::new();

			for provider_id in provider_ids {
				let Some(entry) = state.entries.get(provider_id) else {
					continue;
				};

				if entry.expires_at_ms <= state.now_ms {
					continue;
				}
				if let Some(location) = entry.location {
					map.insert(*provider_id, location);
				}
			}

			Ok(map)
		})
	}
}

/// Wraps a [`MemoryPresence`] and delays every call, for deadline tests.
pub struct SlowPresence {
	pub inner: MemoryPresence,
	pub delay: Duration,
}
impl Presence for SlowPresence {
	fn publish<'a>(&'a self, location: StoredLocation, ttl: Duration) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.publish(location, ttl).await
		})
	}

	fn is_online<'a>(&'a self, provider_id: Uuid) -> BoxFuture<'a, Result<bool>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.is_online(provider_id).await
		})
	}

	fn online_ids<'a>(&'a self) -> BoxFuture<'a, Result<Vec<Uuid>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.online_ids().await
		})
	}

	fn locations<'a>(
		&'a self,
		provider_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, StoredLocation>>> {
		Box::pin(async move {
			tokio::time::sleep(self.delay).await;

			self.inner.locations(provider_ids).await
		})
	}
}

/// Capability index double returning preset hits, restricted to the candidate
/// id set and ordered per the retriever contract.
pub struct CannedIndex {
	hits: Vec<CapabilityHit>,
	fail: bool,
	calls: AtomicUsize,
}
impl CannedIndex {
	pub fn new(hits: Vec<CapabilityHit>) -> Self {
		Self { hits, fail: false, calls: AtomicUsize::new(0) }
	}

	pub fn failing() -> Self {
		Self { hits: Vec::new(), fail: true, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl CandidateIndex for CannedIndex {
	fn top_k_similar<'a>(
		&'a self,
		_query_vector: &'a [f32],
		candidate_ids: &'a [Uuid],
		k: u32,
	) -> BoxFuture<'a, Result<Vec<CapabilityHit>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.fail {
				return Err(Error::IndexUnavailable { message: "Simulated outage.".to_string() });
			}

			let mut hits: Vec<CapabilityHit> = self
				.hits
				.iter()
				.filter(|hit| candidate_ids.contains(&hit.provider_id))
				.cloned()
				.collect();

			hits.sort_by(|a, b| {
				b.similarity
					.partial_cmp(&a.similarity)
					.unwrap_or(CmpOrdering::Equal)
					.then_with(|| a.provider_id.cmp(&b.provider_id))
			});
			hits.truncate(k as usize);

			Ok(hits)
		})
	}
}

/// Directory double serving a fixed card set.
pub struct StaticDirectory {
	cards: Vec<ProviderCard>,
}
impl StaticDirectory {
	pub fn new(cards: Vec<ProviderCard>) -> Self {
		Self { cards }
	}
}
impl ProviderDirectory for StaticDirectory {
	fn cards<'a>(&'a self, provider_ids: &'a [Uuid]) -> BoxFuture<'a, Result<Vec<ProviderCard>>> {
		Box::pin(async move {
			Ok(self
				.cards
				.iter()
				.filter(|card| provider_ids.contains(&card.provider_id))
				.cloned()
				.collect())
		})
	}
}

/// Embedder double returning the same unit vector for every text.
pub struct FixedEmbedding {
	vector_dim: u32,
	fail: bool,
	calls: AtomicUsize,
}
impl FixedEmbedding {
	pub fn new(vector_dim: u32) -> Self {
		Self { vector_dim, fail: false, calls: AtomicUsize::new(0) }
	}

	pub fn failing(vector_dim: u32) -> Self {
		Self { vector_dim, fail: true, calls: AtomicUsize::new(0) }
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl EmbeddingProvider for FixedEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			if self.fail {
				return Err(Error::EmbeddingFailure { message: "Simulated outage.".to_string() });
			}

			let mut vector = vec![0.0; self.vector_dim as usize];

			if let Some(first) = vector.first_mut() {
				*first = 1.0;
			}

			Ok(vec![vector; texts.len()])
		})
	}
}
