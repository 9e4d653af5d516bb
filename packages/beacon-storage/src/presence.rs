use std::{
	collections::{HashMap, HashSet},
	time::Duration,
};

use redis::{AsyncCommands, aio::ConnectionManager};
use uuid::Uuid;

use beacon_domain::geo::GeoPoint;

use crate::{Result, models::StoredLocation};

const ONLINE_KEY_PATTERN: &str = "provider:*:online";

/// Redis-backed presence tracking. A live provider owns two keys with one
/// shared lifetime: `provider:{id}:online` and `provider:{id}:loc`. Absence of
/// either key means offline; expiry is never observed directly, only as a miss
/// on read.
pub struct PresenceStore {
	conn: ConnectionManager,
	scan_count: u32,
}
impl PresenceStore {
	pub async fn connect(cfg: &beacon_config::Redis, scan_count: u32) -> Result<Self> {
		let client = redis::Client::open(cfg.url.as_str())?;
		let conn = client.get_connection_manager().await?;

		Ok(Self { conn, scan_count })
	}

	/// Refreshes the online marker and the location payload in one MULTI/EXEC
	/// pipeline, so both facets always carry the same remaining lifetime.
	pub async fn publish(&self, location: StoredLocation, ttl: Duration) -> Result<()> {
		let payload = serde_json::to_string(&location)?;
		let ttl_seconds = ttl.as_secs().max(1);
		let mut conn = self.conn.clone();
		let mut pipe = redis::pipe();

		pipe.atomic()
			.set_ex(online_key(location.provider_id), 1, ttl_seconds)
			.ignore()
			.set_ex(location_key(location.provider_id), payload, ttl_seconds)
			.ignore();

		let _: () = pipe.query_async(&mut conn).await?;

		Ok(())
	}

	pub async fn is_online(&self, provider_id: Uuid) -> Result<bool> {
		let mut conn = self.conn.clone();
		let exists: bool = conn.exists(online_key(provider_id)).await?;

		Ok(exists)
	}

	/// Cursor-scans the keyspace for live online markers. The result is a
	/// point-in-time snapshot: an id returned here may already be expired by
	/// the time its location is read.
	pub async fn online_ids(&self) -> Result<Vec<Uuid>> {
		let mut conn = self.conn.clone();
		// SCAN may return the same key more than once; the set absorbs it.
		let mut ids = HashSet::new();
		let mut cursor = 0_u64;

		loop {
			let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(ONLINE_KEY_PATTERN)
				.arg("COUNT")
				.arg(self.scan_count)
				.query_async(&mut conn)
				.await?;

			for key in keys {
				match provider_id_from_key(&key) {
					Some(id) => {
						ids.insert(id);
					},
					None => tracing::warn!(%key, "Skipping unparsable presence key."),
				}
			}

			cursor = next;

			if cursor == 0 {
				break;
			}
		}

		Ok(ids.into_iter().collect())
	}

	pub async fn location(&self, provider_id: Uuid) -> Result<Option<StoredLocation>> {
		let mut conn = self.conn.clone();
		let raw: Option<String> = conn.get(location_key(provider_id)).await?;

		Ok(raw.and_then(|raw| parse_location(provider_id, &raw)))
	}

	/// Fetches the live locations of `provider_ids` in one pipelined round
	/// trip. Ids with no live payload are absent from the map, never an error.
	pub async fn locations(&self, provider_ids: &[Uuid]) -> Result<HashMap<Uuid, StoredLocation>> {
		if provider_ids.is_empty() {
			return Ok(HashMap::new());
		}

		let mut conn = self.conn.clone();
		let mut pipe = redis::pipe();

		for provider_id in provider_ids {
			pipe.get(location_key(*provider_id));
		}

		let values: Vec<Option<String>> = pipe.query_async(&mut conn).await?;
		let mut map = HashMap::with_capacity(provider_ids.len());

		for (provider_id, value) in provider_ids.iter().zip(values) {
			let Some(raw) = value else {
				continue;
			};

			if let Some(location) = parse_location(*provider_id, &raw) {
				map.insert(*provider_id, location);
			}
		}

		Ok(map)
	}
}

fn online_key(provider_id: Uuid) -> String {
	format!("provider:{provider_id}:online")
}

fn location_key(provider_id: Uuid) -> String {
	format!("provider:{provider_id}:loc")
}

fn provider_id_from_key(key: &str) -> Option<Uuid> {
	let id = key.strip_prefix("provider:")?.strip_suffix(":online")?;

	Uuid::parse_str(id).ok()
}

/// A payload that does not parse, or that carries out-of-range coordinates,
/// reads as absent. A stale or corrupt heartbeat must never take a whole
/// search down with it.
fn parse_location(provider_id: Uuid, raw: &str) -> Option<StoredLocation> {
	match serde_json::from_str::<StoredLocation>(raw) {
		Ok(location) => match GeoPoint::try_new(location.point.lat, location.point.lng) {
			Ok(_) => Some(location),
			Err(err) => {
				tracing::warn!(%provider_id, error = %err, "Discarding out-of-range location payload.");

				None
			},
		},
		Err(err) => {
			tracing::warn!(%provider_id, error = %err, "Discarding malformed location payload.");

			None
		},
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_provider_id_from_online_key() {
		let id = Uuid::new_v4();

		assert_eq!(provider_id_from_key(&online_key(id)), Some(id));
		assert_eq!(provider_id_from_key("provider:not-a-uuid:online"), None);
		assert_eq!(provider_id_from_key("provider:whatever:loc"), None);
		assert_eq!(provider_id_from_key("unrelated"), None);
	}

	#[test]
	fn malformed_payload_reads_as_absent() {
		assert!(parse_location(Uuid::new_v4(), "{not json").is_none());
		assert!(parse_location(Uuid::new_v4(), r#"{"id":"x"}"#).is_none());
	}

	#[test]
	fn out_of_range_payload_reads_as_absent() {
		let raw = r#"{"id":"8d8ac610-566d-4ef0-9c22-186b2a5ed793","lat":95.0,"lng":0.0}"#;

		assert!(parse_location(Uuid::new_v4(), raw).is_none());
	}

	#[test]
	fn valid_payload_round_trips() {
		let location = StoredLocation {
			provider_id: Uuid::new_v4(),
			point: GeoPoint::try_new(13.754, 100.5014).unwrap(),
		};
		let raw = serde_json::to_string(&location).unwrap();

		assert_eq!(parse_location(location.provider_id, &raw), Some(location));
	}
}
