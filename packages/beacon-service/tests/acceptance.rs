//! Full-stack exercise against real Redis, Qdrant, and Postgres. Seeds the
//! directory and the capability index out-of-band, then drives heartbeat and
//! search through the engine.

use std::sync::Arc;

use uuid::Uuid;

use beacon_config::{
	Config, EmbeddingProviderConfig, Matching, Postgres, Providers, Qdrant, Redis, Service, Storage,
};
use beacon_domain::geo::EARTH_RADIUS_M;
use beacon_service::{
	BeaconService, CallerContext, Collaborators, HeartbeatRequest, NearbyRequest, Role,
	SearchRequest,
};
use beacon_storage::{
	db::Db,
	directory,
	models::{CapabilityRecord, ProviderCard},
	presence::PresenceStore,
	vector::VectorIndex,
};
use beacon_testkit::doubles::FixedEmbedding;

const ORIGIN_LAT: f64 = 13.7540;
const ORIGIN_LNG: f64 = 100.5014;

fn test_config(dsn: String, redis_url: String, qdrant_url: String, collection: String) -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:8080".to_string(),
			log_level: "info".to_string(),
			allow_public_bind: false,
		},
		storage: Storage {
			postgres: Postgres { dsn, pool_max_conns: 2 },
			redis: Redis { url: redis_url, op_timeout_ms: 2_000 },
			qdrant: Qdrant { url: qdrant_url, collection, vector_dim: 4, timeout_ms: 5_000 },
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "p".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "m".to_string(),
				dimensions: 4,
				timeout_ms: 1_000,
				default_headers: serde_json::Map::new(),
			},
		},
		presence: beacon_config::Presence { ttl_seconds: 60, scan_count: 100 },
		matching: Matching {
			alpha: 0.7,
			score_floor: 0.5,
			default_top_k: 20,
			max_top_k: 100,
			default_range_m: 10_000.0,
			search_deadline_ms: 10_000,
		},
	}
}

fn card(provider_id: Uuid, display_name: &str, kind: &str) -> ProviderCard {
	ProviderCard {
		provider_id,
		display_name: display_name.to_string(),
		kind: kind.to_string(),
		career: "housekeeper".to_string(),
		other_ability: "laundry".to_string(),
		vehicle: false,
		offsite_work: true,
	}
}

fn capability(provider_id: Uuid, kind: &str) -> CapabilityRecord {
	CapabilityRecord {
		provider_id,
		kind: kind.to_string(),
		career: "housekeeper".to_string(),
		other_ability: "laundry".to_string(),
	}
}

#[tokio::test]
#[ignore = "Requires external Redis, Qdrant, and Postgres. Set BEACON_REDIS_URL, BEACON_QDRANT_URL, and BEACON_PG_DSN to run."]
async fn heartbeat_then_search_round_trip() {
	let Some(base_dsn) = beacon_testkit::env_dsn() else {
		eprintln!("Skipping heartbeat_then_search_round_trip; set BEACON_PG_DSN to run this test.");

		return;
	};
	let Some(qdrant_url) = beacon_testkit::env_qdrant_url() else {
		eprintln!(
			"Skipping heartbeat_then_search_round_trip; set BEACON_QDRANT_URL to run this test."
		);

		return;
	};
	let Some(redis_url) = beacon_testkit::env_redis_url() else {
		eprintln!(
			"Skipping heartbeat_then_search_round_trip; set BEACON_REDIS_URL to run this test."
		);

		return;
	};
	let test_db =
		beacon_testkit::TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let collection = test_db.collection_name("beacon_acceptance");
	let cfg = test_config(test_db.dsn().to_string(), redis_url, qdrant_url, collection);
	let db = Db::connect(&cfg.storage.postgres).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to bootstrap the schema.");

	let index = VectorIndex::new(&cfg.storage.qdrant).expect("Failed to build the Qdrant client.");

	index.ensure_collection().await.expect("Failed to create the collection.");

	let presence = PresenceStore::connect(&cfg.storage.redis, cfg.presence.scan_count)
		.await
		.expect("Failed to connect to Redis.");
	let p1 = Uuid::new_v4();
	let p2 = Uuid::new_v4();
	let offline = Uuid::new_v4();

	for (id, name) in [(p1, "Anna"), (p2, "Boris"), (offline, "Chai")] {
		directory::upsert_provider(&db.pool, &card(id, name, "cleaning"))
			.await
			.expect("Failed to upsert provider card.");
	}

	// The query embedder below always returns [1, 0, 0, 0]; these vectors pin
	// the cosine similarities to 1.0, 0.6, and 0.0.
	index
		.upsert_capability(&capability(p1, "cleaning"), vec![1.0, 0.0, 0.0, 0.0])
		.await
		.expect("Failed to index capability.");
	index
		.upsert_capability(&capability(p2, "cleaning"), vec![0.6, 0.8, 0.0, 0.0])
		.await
		.expect("Failed to index capability.");
	index
		.upsert_capability(&capability(offline, "gardening"), vec![0.0, 1.0, 0.0, 0.0])
		.await
		.expect("Failed to index capability.");

	let mut collaborators = Collaborators::live(&cfg, presence, index, db);

	collaborators.embedding = Arc::new(FixedEmbedding::new(4));

	let service = BeaconService::with_collaborators(cfg, collaborators);
	let north = |meters: f64| ORIGIN_LAT + (meters / EARTH_RADIUS_M).to_degrees();

	service
		.heartbeat(
			&CallerContext { caller_id: p1, role: Role::Provider },
			HeartbeatRequest { lat: north(300.0), lng: ORIGIN_LNG },
		)
		.await
		.expect("Heartbeat failed.");
	service
		.heartbeat(
			&CallerContext { caller_id: p2, role: Role::Provider },
			HeartbeatRequest { lat: north(100.0), lng: ORIGIN_LNG },
		)
		.await
		.expect("Heartbeat failed.");

	assert!(service.is_online(p1).await.expect("Probe failed."));
	assert!(!service.is_online(offline).await.expect("Probe failed."));

	let caller = CallerContext { caller_id: Uuid::new_v4(), role: Role::Requester };
	let response = service
		.search(
			&caller,
			SearchRequest {
				query: "cleaning help".to_string(),
				lat: ORIGIN_LAT,
				lng: ORIGIN_LNG,
				top_k: None,
				range_m: None,
				scale_m: Some(5_000.0),
			},
		)
		.await
		.expect("Search failed.");
	let order: Vec<Uuid> =
		response.candidates.iter().map(|candidate| candidate.provider_id).collect();

	// The indexed-but-offline provider must never surface.
	assert_eq!(order, vec![p1, p2]);
	assert!((response.candidates[0].similarity - 1.0).abs() < 1e-3);
	assert!((response.candidates[1].similarity - 0.6).abs() < 1e-3);
	assert!((response.candidates[0].distance_m - 300.0).abs() < 2.0);
	assert_eq!(response.candidates[0].display_name, "Anna");

	let nearby = service
		.nearby(&caller, NearbyRequest { lat: ORIGIN_LAT, lng: ORIGIN_LNG, range_m: None })
		.await
		.expect("Nearby failed.");
	let p1_position = nearby.candidates.iter().position(|candidate| candidate.provider_id == p1);
	let p2_position = nearby.candidates.iter().position(|candidate| candidate.provider_id == p2);

	// The Redis keyspace is shared, so other live providers may also appear;
	// assert relative order instead of exact membership.
	let p1_position = p1_position.expect("P1 missing from nearby results.");
	let p2_position = p2_position.expect("P2 missing from nearby results.");

	assert!(p2_position < p1_position);

	test_db.cleanup().await.expect("Failed to clean up the test database.");
}
