use std::collections::HashMap;

use uuid::Uuid;

use beacon_domain::{
	geo::{self, GeoPoint},
	rank,
};
use beacon_storage::models::ProviderCard;

use crate::{BeaconService, CallerContext, Error, Result, Role};

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	pub lat: f64,
	pub lng: f64,
	pub top_k: Option<u32>,
	pub range_m: Option<f64>,
	pub scale_m: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Candidate {
	pub provider_id: Uuid,
	pub display_name: String,
	pub kind: String,
	pub career: String,
	pub other_ability: String,
	pub vehicle: bool,
	pub offsite_work: bool,
	pub similarity: f64,
	pub distance_m: f64,
	pub score: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub count: usize,
	pub candidates: Vec<Candidate>,
}

impl BeaconService {
	/// Ranks online providers against a free-text need, blending semantic
	/// similarity with geographic proximity.
	pub async fn search(
		&self,
		caller: &CallerContext,
		request: SearchRequest,
	) -> Result<SearchResponse> {
		if caller.role != Role::Requester {
			return Err(Error::Forbidden { message: "Only requesters can search.".to_string() });
		}

		let query = request.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidArgument {
				message: "Query text must be non-empty.".to_string(),
			});
		}

		let origin = crate::validate_point(request.lat, request.lng)?;
		let top_k = self.resolve_top_k(request.top_k)?;
		let range_m = self.resolve_range(request.range_m)?;
		let scale_m = match request.scale_m {
			Some(scale) if !scale.is_finite() || scale <= 0.0 =>
				return Err(Error::InvalidArgument {
					message: "scale_m must be a positive number.".to_string(),
				}),
			Some(scale) => scale,
			// The decay scale defaults to the search radius itself.
			None => range_m,
		};

		match tokio::time::timeout(
			self.search_deadline(),
			self.ranked_search(origin, query, top_k, range_m, scale_m),
		)
		.await
		{
			Ok(result) => result,
			Err(_) => Err(Error::DeadlineExceeded {
				message: "Search did not finish within the configured deadline.".to_string(),
			}),
		}
	}

	async fn ranked_search(
		&self,
		origin: GeoPoint,
		query: &str,
		top_k: u32,
		range_m: f64,
		scale_m: f64,
	) -> Result<SearchResponse> {
		let online = self.collaborators.presence.online_ids().await?;

		if online.is_empty() {
			// Nobody to rank; skip the embedder and the index entirely.
			return Ok(SearchResponse { count: 0, candidates: Vec::new() });
		}

		let query_vector = self.embed_query(query).await?;
		let hits = self.collaborators.index.top_k_similar(&query_vector, &online, top_k).await?;

		if hits.is_empty() {
			return Ok(SearchResponse { count: 0, candidates: Vec::new() });
		}

		let hit_ids: Vec<Uuid> = hits.iter().map(|hit| hit.provider_id).collect();
		let locations = self.collaborators.presence.locations(&hit_ids).await?;
		let cards: HashMap<Uuid, ProviderCard> = self
			.collaborators
			.directory
			.cards(&hit_ids)
			.await?
			.into_iter()
			.map(|card| (card.provider_id, card))
			.collect();
		let alpha = self.cfg.matching.alpha;
		let mut dropped_no_location = 0_usize;
		let mut dropped_no_card = 0_usize;
		let mut dropped_out_of_range = 0_usize;
		let mut candidates = Vec::with_capacity(hits.len());

		for hit in hits {
			// An id can expire between the online scan and the location read.
			// Such a candidate cannot be scored for distance; exclude it.
			let Some(location) = locations.get(&hit.provider_id) else {
				dropped_no_location += 1;

				tracing::debug!(
					provider_id = %hit.provider_id,
					"Dropping candidate without a live location."
				);

				continue;
			};
			let Some(card) = cards.get(&hit.provider_id) else {
				dropped_no_card += 1;

				tracing::warn!(
					provider_id = %hit.provider_id,
					"Dropping candidate without directory metadata."
				);

				continue;
			};
			let distance_m = geo::haversine_m(origin, location.point);

			if distance_m > range_m {
				dropped_out_of_range += 1;

				continue;
			}

			let score = rank::blend_score(hit.similarity, distance_m, alpha, scale_m);

			// Capability text comes from the hit: the payload is what the
			// similarity was computed against, even when the card lags a
			// re-indexing. The card supplies the rest.
			candidates.push(Candidate {
				provider_id: hit.provider_id,
				display_name: card.display_name.clone(),
				kind: hit.kind,
				career: hit.career,
				other_ability: hit.other_ability,
				vehicle: card.vehicle,
				offsite_work: card.offsite_work,
				similarity: hit.similarity,
				distance_m,
				score,
			});
		}

		if dropped_no_location + dropped_no_card + dropped_out_of_range > 0 {
			tracing::info!(
				dropped_no_location,
				dropped_no_card,
				dropped_out_of_range,
				"Excluded candidates during search."
			);
		}

		let ranked = rank::two_tier_order(
			candidates,
			|candidate| candidate.score,
			|candidate| candidate.distance_m,
			self.cfg.matching.score_floor,
		);

		Ok(SearchResponse { count: ranked.len(), candidates: ranked })
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let texts = [query.to_string()];
		let embeddings =
			self.collaborators.embedding.embed(&self.cfg.providers.embedding, &texts).await?;
		let Some(vector) = embeddings.into_iter().next() else {
			return Err(Error::EmbeddingFailure {
				message: "Embedding provider returned no vectors.".to_string(),
			});
		};

		if vector.len() != self.cfg.storage.qdrant.vector_dim as usize {
			return Err(Error::EmbeddingFailure {
				message: "Embedding vector dimension mismatch.".to_string(),
			});
		}

		Ok(vector)
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> Result<u32> {
		let top_k = requested.unwrap_or(self.cfg.matching.default_top_k);

		if top_k == 0 {
			return Err(Error::InvalidArgument {
				message: "top_k must be greater than zero.".to_string(),
			});
		}
		if top_k > self.cfg.matching.max_top_k {
			return Err(Error::InvalidArgument {
				message: format!("top_k must be at most {}.", self.cfg.matching.max_top_k),
			});
		}

		Ok(top_k)
	}
}
