use std::{cmp::Ordering, collections::HashMap, time::Duration};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, Distance, Filter, PointStruct, Query,
		QueryPointsBuilder, UpsertPointsBuilder, Value, VectorParamsBuilder, point_id::PointIdOptions,
		value::Kind,
	},
};
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{CapabilityHit, CapabilityRecord},
};

/// Qdrant-backed capability index. One cosine collection, point id = provider
/// UUID, payload carries the capability text.
pub struct VectorIndex {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl VectorIndex {
	pub fn new(cfg: &beacon_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(&self.collection).await? {
			return Ok(());
		}

		self.client
			.create_collection(CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
				VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
			))
			.await?;

		Ok(())
	}

	/// Writes one provider's capability embedding and payload. Point id is the
	/// provider id, so a re-registration overwrites the previous point.
	pub async fn upsert_capability(
		&self,
		record: &CapabilityRecord,
		embedding: Vec<f32>,
	) -> Result<()> {
		if embedding.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Embedding dimension {} does not match the collection dimension {}.",
				embedding.len(),
				self.vector_dim,
			)));
		}

		let mut payload = Payload::new();

		payload.insert("provider_id", record.provider_id.to_string());
		payload.insert("kind", record.kind.clone());
		payload.insert("career", record.career.clone());
		payload.insert("other_ability", record.other_ability.clone());

		let point = PointStruct::new(record.provider_id.to_string(), embedding, payload);

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true))
			.await?;

		Ok(())
	}

	/// Returns the `k` capability rows most similar to `query_vector`, limited
	/// to `candidate_ids`. Ordered by similarity descending, ties by provider
	/// id ascending. An empty candidate set short-circuits without touching
	/// the index.
	pub async fn top_k_similar(
		&self,
		query_vector: &[f32],
		candidate_ids: &[Uuid],
		k: u32,
	) -> Result<Vec<CapabilityHit>> {
		if k == 0 {
			return Err(Error::InvalidArgument("k must be greater than zero.".to_string()));
		}
		if query_vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector dimension {} does not match the collection dimension {}.",
				query_vector.len(),
				self.vector_dim,
			)));
		}
		if candidate_ids.is_empty() {
			return Ok(Vec::new());
		}

		let filter = Filter {
			must: vec![Condition::has_id(candidate_ids.iter().map(|id| id.to_string()))],
			should: Vec::new(),
			must_not: Vec::new(),
			min_should: None,
		};
		let search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(query_vector.to_vec()))
			.filter(filter)
			.limit(u64::from(k))
			.with_payload(true);
		let response = self.client.query(search).await?;
		let mut hits: Vec<CapabilityHit> =
			response.result.iter().filter_map(hit_from_point).collect();

		// Qdrant already returns best-first; re-sorting pins the tie order so
		// equal-similarity results come back in a reproducible order.
		hits.sort_by(|a, b| {
			b.similarity
				.partial_cmp(&a.similarity)
				.unwrap_or(Ordering::Equal)
				.then_with(|| a.provider_id.cmp(&b.provider_id))
		});
		hits.truncate(k as usize);

		Ok(hits)
	}
}

fn hit_from_point(point: &qdrant_client::qdrant::ScoredPoint) -> Option<CapabilityHit> {
	let point_id = point.id.as_ref()?;
	let Some(provider_id) = point_id_to_uuid(point_id) else {
		tracing::warn!(?point_id, "Skipping index point with a non-UUID id.");

		return None;
	};
	// Cosine similarity from a normalized collection; clamp against float
	// drift at the boundaries.
	let similarity = f64::from(point.score).clamp(0.0, 1.0);

	Some(CapabilityHit {
		provider_id,
		similarity,
		kind: payload_string(&point.payload, "kind").unwrap_or_default(),
		career: payload_string(&point.payload, "career").unwrap_or_default(),
		other_ability: payload_string(&point.payload, "other_ability").unwrap_or_default(),
	})
}

fn point_id_to_uuid(point_id: &qdrant_client::qdrant::PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	let value = payload.get(key)?;

	match &value.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}
