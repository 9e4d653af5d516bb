use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub presence: Presence,
	pub matching: Matching,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
	/// Loopback binds are enforced unless this is set.
	#[serde(default)]
	pub allow_public_bind: bool,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub redis: Redis,
	pub qdrant: Qdrant,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Redis {
	pub url: String,
	pub op_timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Presence {
	/// Lifetime of a heartbeat, applied to the online marker and the location
	/// payload alike.
	pub ttl_seconds: u64,
	/// COUNT hint for keyspace scans when enumerating online providers.
	pub scan_count: u32,
}

#[derive(Debug, Deserialize)]
pub struct Matching {
	/// Weight of the semantic signal in the blended score.
	pub alpha: f64,
	/// Partition boundary between score-ordered and distance-ordered results.
	pub score_floor: f64,
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Search radius in meters when the request does not supply one.
	pub default_range_m: f64,
	/// Overall deadline for one search call, covering every backend round
	/// trip it makes.
	pub search_deadline_ms: u64,
}
