use std::time::Duration;

use uuid::Uuid;

use beacon_domain::geo::GeoPoint;
use beacon_storage::{
	Error,
	db::Db,
	directory,
	models::{CapabilityRecord, ProviderCard, StoredLocation},
	presence::PresenceStore,
	vector::VectorIndex,
};

fn point(lat: f64, lng: f64) -> GeoPoint {
	GeoPoint::try_new(lat, lng).expect("Coordinates out of range.")
}

fn location(provider_id: Uuid) -> StoredLocation {
	StoredLocation { provider_id, point: point(13.754, 100.5014) }
}

async fn connect_presence(url: &str) -> PresenceStore {
	let cfg = beacon_config::Redis { url: url.to_string(), op_timeout_ms: 2_000 };

	PresenceStore::connect(&cfg, 100).await.expect("Failed to connect to Redis.")
}

#[tokio::test]
#[ignore = "Requires external Redis. Set BEACON_REDIS_URL to run."]
async fn presence_publish_round_trips_both_facets() {
	let Some(url) = beacon_testkit::env_redis_url() else {
		eprintln!(
			"Skipping presence_publish_round_trips_both_facets; set BEACON_REDIS_URL to run this test."
		);

		return;
	};
	let store = connect_presence(&url).await;
	let provider_id = Uuid::new_v4();
	let written = location(provider_id);

	store.publish(written, Duration::from_secs(60)).await.expect("Publish failed.");

	assert!(store.is_online(provider_id).await.expect("Probe failed."));
	assert_eq!(store.location(provider_id).await.expect("Read failed."), Some(written));

	let missing = Uuid::new_v4();
	let map = store.locations(&[provider_id, missing]).await.expect("Batch read failed.");

	assert_eq!(map.len(), 1);
	assert_eq!(map.get(&provider_id), Some(&written));

	let online = store.online_ids().await.expect("Scan failed.");

	assert!(online.contains(&provider_id));
	assert!(!store.is_online(missing).await.expect("Probe failed."));
}

#[tokio::test]
#[ignore = "Requires external Redis. Set BEACON_REDIS_URL to run."]
async fn presence_expires_marker_and_location_together() {
	let Some(url) = beacon_testkit::env_redis_url() else {
		eprintln!(
			"Skipping presence_expires_marker_and_location_together; set BEACON_REDIS_URL to run this test."
		);

		return;
	};
	let store = connect_presence(&url).await;
	let provider_id = Uuid::new_v4();

	store.publish(location(provider_id), Duration::from_secs(1)).await.expect("Publish failed.");

	assert!(store.is_online(provider_id).await.expect("Probe failed."));

	tokio::time::sleep(Duration::from_millis(1_500)).await;

	assert!(!store.is_online(provider_id).await.expect("Probe failed."));
	assert_eq!(store.location(provider_id).await.expect("Read failed."), None);
	assert!(!store.online_ids().await.expect("Scan failed.").contains(&provider_id));
}

#[tokio::test]
#[ignore = "Requires external Redis. Set BEACON_REDIS_URL to run."]
async fn presence_refresh_overwrites_previous_location() {
	let Some(url) = beacon_testkit::env_redis_url() else {
		eprintln!(
			"Skipping presence_refresh_overwrites_previous_location; set BEACON_REDIS_URL to run this test."
		);

		return;
	};
	let store = connect_presence(&url).await;
	let provider_id = Uuid::new_v4();
	let first = StoredLocation { provider_id, point: point(13.754, 100.5014) };
	let second = StoredLocation { provider_id, point: point(13.80, 100.60) };

	store.publish(first, Duration::from_secs(60)).await.expect("Publish failed.");
	store.publish(second, Duration::from_secs(60)).await.expect("Publish failed.");

	assert_eq!(store.location(provider_id).await.expect("Read failed."), Some(second));
}

#[tokio::test]
#[ignore = "Requires external Redis. Set BEACON_REDIS_URL to run."]
async fn presence_treats_corrupt_payload_as_absent() {
	let Some(url) = beacon_testkit::env_redis_url() else {
		eprintln!(
			"Skipping presence_treats_corrupt_payload_as_absent; set BEACON_REDIS_URL to run this test."
		);

		return;
	};
	let store = connect_presence(&url).await;
	let provider_id = Uuid::new_v4();
	// Plant a live marker next to a payload no heartbeat could have written.
	let client = redis::Client::open(url.as_str()).expect("Failed to open the Redis client.");
	let mut conn = client
		.get_multiplexed_async_connection()
		.await
		.expect("Failed to connect to Redis.");
	let _: () = redis::cmd("SETEX")
		.arg(format!("provider:{provider_id}:online"))
		.arg(60)
		.arg(1)
		.query_async(&mut conn)
		.await
		.expect("SETEX failed.");
	let _: () = redis::cmd("SETEX")
		.arg(format!("provider:{provider_id}:loc"))
		.arg(60)
		.arg("{broken")
		.query_async(&mut conn)
		.await
		.expect("SETEX failed.");

	assert!(store.is_online(provider_id).await.expect("Probe failed."));
	assert_eq!(store.location(provider_id).await.expect("Read failed."), None);
	assert!(store.locations(&[provider_id]).await.expect("Batch read failed.").is_empty());
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BEACON_QDRANT_URL to run."]
async fn vector_top_k_respects_candidate_filter_and_order() {
	let Some(url) = beacon_testkit::env_qdrant_url() else {
		eprintln!(
			"Skipping vector_top_k_respects_candidate_filter_and_order; set BEACON_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = format!("beacon_storage_{}", Uuid::new_v4().simple());
	let cfg = beacon_config::Qdrant {
		url,
		collection: collection.clone(),
		vector_dim: 4,
		timeout_ms: 5_000,
	};
	let index = VectorIndex::new(&cfg).expect("Failed to build the Qdrant client.");

	index.ensure_collection().await.expect("Failed to create the collection.");

	let a = Uuid::new_v4();
	let b = Uuid::new_v4();
	let c = Uuid::new_v4();
	let record = |id: Uuid, kind: &str| CapabilityRecord {
		provider_id: id,
		kind: kind.to_string(),
		career: "housekeeper".to_string(),
		other_ability: "laundry".to_string(),
	};

	index
		.upsert_capability(&record(a, "cleaning"), vec![1.0, 0.0, 0.0, 0.0])
		.await
		.expect("Upsert failed.");
	index
		.upsert_capability(&record(b, "cleaning"), vec![0.6, 0.8, 0.0, 0.0])
		.await
		.expect("Upsert failed.");
	index
		.upsert_capability(&record(c, "gardening"), vec![0.0, 1.0, 0.0, 0.0])
		.await
		.expect("Upsert failed.");

	let query = [1.0_f32, 0.0, 0.0, 0.0];
	let hits = index.top_k_similar(&query, &[a, b], 10).await.expect("Query failed.");

	// C is indexed but outside the candidate set.
	assert_eq!(hits.len(), 2);
	assert_eq!(hits[0].provider_id, a);
	assert_eq!(hits[1].provider_id, b);
	assert!((hits[0].similarity - 1.0).abs() < 1e-3);
	assert!((hits[1].similarity - 0.6).abs() < 1e-3);
	assert_eq!(hits[0].kind, "cleaning");
	assert_eq!(hits[0].career, "housekeeper");
	assert_eq!(hits[0].other_ability, "laundry");

	let only_top = index.top_k_similar(&query, &[a, b, c], 1).await.expect("Query failed.");

	assert_eq!(only_top.len(), 1);
	assert_eq!(only_top[0].provider_id, a);

	let empty = index.top_k_similar(&query, &[], 5).await.expect("Query failed.");

	assert!(empty.is_empty());
	assert!(matches!(
		index.top_k_similar(&query, &[a], 0).await,
		Err(Error::InvalidArgument(_))
	));
	assert!(matches!(
		index.top_k_similar(&[1.0, 0.0], &[a], 5).await,
		Err(Error::InvalidArgument(_))
	));

	index.client.delete_collection(&collection).await.expect("Failed to delete the collection.");
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BEACON_QDRANT_URL to run."]
async fn vector_breaks_similarity_ties_by_provider_id() {
	let Some(url) = beacon_testkit::env_qdrant_url() else {
		eprintln!(
			"Skipping vector_breaks_similarity_ties_by_provider_id; set BEACON_QDRANT_URL to run this test."
		);

		return;
	};
	let collection = format!("beacon_storage_{}", Uuid::new_v4().simple());
	let cfg = beacon_config::Qdrant {
		url,
		collection: collection.clone(),
		vector_dim: 4,
		timeout_ms: 5_000,
	};
	let index = VectorIndex::new(&cfg).expect("Failed to build the Qdrant client.");

	index.ensure_collection().await.expect("Failed to create the collection.");

	let mut ids = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];

	for id in ids {
		let record = CapabilityRecord {
			provider_id: id,
			kind: "cleaning".to_string(),
			career: String::new(),
			other_ability: String::new(),
		};

		index
			.upsert_capability(&record, vec![1.0, 0.0, 0.0, 0.0])
			.await
			.expect("Upsert failed.");
	}

	let hits = index
		.top_k_similar(&[1.0, 0.0, 0.0, 0.0], &ids, 10)
		.await
		.expect("Query failed.");
	let order: Vec<Uuid> = hits.iter().map(|hit| hit.provider_id).collect();

	ids.sort();

	assert_eq!(order, ids);

	index.client.delete_collection(&collection).await.expect("Failed to delete the collection.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set BEACON_PG_DSN to run."]
async fn directory_upserts_and_resolves_cards() {
	let Some(base_dsn) = beacon_testkit::env_dsn() else {
		eprintln!(
			"Skipping directory_upserts_and_resolves_cards; set BEACON_PG_DSN to run this test."
		);

		return;
	};

	beacon_testkit::with_test_db(&base_dsn, |test_db| {
		// Clone what the future needs; it must not borrow the harness.
		let dsn = test_db.dsn().to_string();

		async move {
			let message = |context: &str, err: String| {
				beacon_testkit::Error::Message(format!("{context}: {err}."))
			};
			let cfg = beacon_config::Postgres { dsn, pool_max_conns: 2 };
			let db = Db::connect(&cfg)
				.await
				.map_err(|err| message("Failed to connect to Postgres", err.to_string()))?;

			// Bootstrapping twice must be a no-op.
			db.ensure_schema()
				.await
				.map_err(|err| message("Failed to bootstrap the schema", err.to_string()))?;
			db.ensure_schema()
				.await
				.map_err(|err| message("Failed to bootstrap the schema", err.to_string()))?;

			let p1 = Uuid::new_v4();
			let p2 = Uuid::new_v4();
			let card = |id: Uuid, name: &str| ProviderCard {
				provider_id: id,
				display_name: name.to_string(),
				kind: "cleaning".to_string(),
				career: "housekeeper".to_string(),
				other_ability: "laundry".to_string(),
				vehicle: true,
				offsite_work: false,
			};

			directory::upsert_provider(&db.pool, &card(p1, "Anna"))
				.await
				.map_err(|err| message("Failed to upsert provider", err.to_string()))?;
			directory::upsert_provider(&db.pool, &card(p2, "Boris"))
				.await
				.map_err(|err| message("Failed to upsert provider", err.to_string()))?;

			let missing = Uuid::new_v4();
			let mut cards = directory::provider_cards(&db.pool, &[p1, p2, missing])
				.await
				.map_err(|err| message("Failed to fetch cards", err.to_string()))?;

			cards.sort_by(|a, b| a.display_name.cmp(&b.display_name));

			assert_eq!(cards.len(), 2);
			assert_eq!(cards[0].display_name, "Anna");
			assert_eq!(cards[1].display_name, "Boris");
			assert!(cards[0].vehicle);

			// A repeated upsert replaces the card in place.
			directory::upsert_provider(&db.pool, &card(p1, "Annette"))
				.await
				.map_err(|err| message("Failed to upsert provider", err.to_string()))?;

			let updated = directory::provider_cards(&db.pool, &[p1])
				.await
				.map_err(|err| message("Failed to fetch cards", err.to_string()))?;

			assert_eq!(updated.len(), 1);
			assert_eq!(updated[0].display_name, "Annette");

			let none = directory::provider_cards(&db.pool, &[])
				.await
				.map_err(|err| message("Failed to fetch cards", err.to_string()))?;

			assert!(none.is_empty());

			Ok(())
		}
	})
	.await
	.expect("Directory test failed.");
}
