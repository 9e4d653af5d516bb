use beacon_domain::geo::GeoPoint;
use uuid::Uuid;

/// Live location payload stored under `provider:{id}:loc`. On the wire it is
/// the JSON object `{"id": "...", "lat": ..., "lng": ...}`.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StoredLocation {
	#[serde(rename = "id")]
	pub provider_id: Uuid,
	#[serde(flatten)]
	pub point: GeoPoint,
}

/// Capability text indexed for one provider. The embedding derived from this
/// record lives in the vector index; the record itself rides along as payload.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CapabilityRecord {
	pub provider_id: Uuid,
	pub kind: String,
	pub career: String,
	pub other_ability: String,
}
impl CapabilityRecord {
	/// Text handed to the embedding provider for this capability.
	pub fn embed_text(&self) -> String {
		[self.kind.as_str(), self.career.as_str(), self.other_ability.as_str()]
			.iter()
			.filter(|part| !part.trim().is_empty())
			.copied()
			.collect::<Vec<_>>()
			.join(". ")
	}
}

/// One similarity hit returned by the vector index.
#[derive(Clone, Debug, PartialEq)]
pub struct CapabilityHit {
	pub provider_id: Uuid,
	pub similarity: f64,
	pub kind: String,
	pub career: String,
	pub other_ability: String,
}

/// Directory row describing a provider for display.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize, sqlx::FromRow)]
pub struct ProviderCard {
	pub provider_id: Uuid,
	pub display_name: String,
	pub kind: String,
	pub career: String,
	pub other_ability: String,
	pub vehicle: bool,
	pub offsite_work: bool,
}
