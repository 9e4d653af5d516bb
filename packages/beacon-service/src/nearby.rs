use std::{cmp::Ordering, collections::HashMap};

use uuid::Uuid;

use beacon_domain::geo::{self, GeoPoint};
use beacon_storage::models::ProviderCard;

use crate::{BeaconService, CallerContext, Error, Result, Role};

#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct NearbyRequest {
	pub lat: f64,
	pub lng: f64,
	pub range_m: Option<f64>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NearbyCandidate {
	pub provider_id: Uuid,
	pub display_name: String,
	pub kind: String,
	pub career: String,
	pub other_ability: String,
	pub vehicle: bool,
	pub offsite_work: bool,
	pub distance_m: f64,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct NearbyResponse {
	pub count: usize,
	pub candidates: Vec<NearbyCandidate>,
}

impl BeaconService {
	/// Lists online providers within range of the caller, nearest first. No
	/// semantic signal is involved.
	pub async fn nearby(
		&self,
		caller: &CallerContext,
		request: NearbyRequest,
	) -> Result<NearbyResponse> {
		if caller.role != Role::Requester {
			return Err(Error::Forbidden { message: "Only requesters can search.".to_string() });
		}

		let origin = crate::validate_point(request.lat, request.lng)?;
		let range_m = self.resolve_range(request.range_m)?;

		match tokio::time::timeout(self.search_deadline(), self.nearby_online(origin, range_m))
			.await
		{
			Ok(result) => result,
			Err(_) => Err(Error::DeadlineExceeded {
				message: "Nearby listing did not finish within the configured deadline.".to_string(),
			}),
		}
	}

	async fn nearby_online(&self, origin: GeoPoint, range_m: f64) -> Result<NearbyResponse> {
		let online = self.collaborators.presence.online_ids().await?;

		if online.is_empty() {
			return Ok(NearbyResponse { count: 0, candidates: Vec::new() });
		}

		let locations = self.collaborators.presence.locations(&online).await?;
		let mut dropped_no_location = 0_usize;
		let mut reachable = Vec::with_capacity(online.len());

		for provider_id in &online {
			let Some(location) = locations.get(provider_id) else {
				dropped_no_location += 1;

				continue;
			};
			let distance_m = geo::haversine_m(origin, location.point);

			if distance_m <= range_m {
				reachable.push((*provider_id, distance_m));
			}
		}

		reachable.sort_by(|a, b| {
			a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then_with(|| a.0.cmp(&b.0))
		});

		let reachable_ids: Vec<Uuid> = reachable.iter().map(|(id, _)| *id).collect();
		let cards: HashMap<Uuid, ProviderCard> = self
			.collaborators
			.directory
			.cards(&reachable_ids)
			.await?
			.into_iter()
			.map(|card| (card.provider_id, card))
			.collect();
		let mut dropped_no_card = 0_usize;
		let mut candidates = Vec::with_capacity(reachable.len());

		for (provider_id, distance_m) in reachable {
			let Some(card) = cards.get(&provider_id) else {
				dropped_no_card += 1;

				tracing::warn!(%provider_id, "Dropping nearby candidate without directory metadata.");

				continue;
			};

			candidates.push(NearbyCandidate {
				provider_id,
				display_name: card.display_name.clone(),
				kind: card.kind.clone(),
				career: card.career.clone(),
				other_ability: card.other_ability.clone(),
				vehicle: card.vehicle,
				offsite_work: card.offsite_work,
				distance_m,
			});
		}

		if dropped_no_location + dropped_no_card > 0 {
			tracing::info!(
				dropped_no_location,
				dropped_no_card,
				"Excluded candidates during nearby listing."
			);
		}

		Ok(NearbyResponse { count: candidates.len(), candidates })
	}
}
