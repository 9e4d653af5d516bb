mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Matching, Postgres, Presence, Providers, Qdrant, Redis,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.redis.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.redis.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.redis.op_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.redis.op_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.url.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.url must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.api_base.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.api_base must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.presence.ttl_seconds == 0 {
		return Err(Error::Validation {
			message: "presence.ttl_seconds must be greater than zero.".to_string(),
		});
	}
	if cfg.presence.scan_count == 0 {
		return Err(Error::Validation {
			message: "presence.scan_count must be greater than zero.".to_string(),
		});
	}
	if !cfg.matching.alpha.is_finite() || !(0.0..=1.0).contains(&cfg.matching.alpha) {
		return Err(Error::Validation {
			message: "matching.alpha must be within [0, 1].".to_string(),
		});
	}
	if !cfg.matching.score_floor.is_finite() || !(0.0..=1.0).contains(&cfg.matching.score_floor) {
		return Err(Error::Validation {
			message: "matching.score_floor must be within [0, 1].".to_string(),
		});
	}
	if cfg.matching.default_top_k == 0 {
		return Err(Error::Validation {
			message: "matching.default_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.matching.max_top_k < cfg.matching.default_top_k {
		return Err(Error::Validation {
			message: "matching.max_top_k must be at least matching.default_top_k.".to_string(),
		});
	}
	if !cfg.matching.default_range_m.is_finite() || cfg.matching.default_range_m <= 0.0 {
		return Err(Error::Validation {
			message: "matching.default_range_m must be a positive number.".to_string(),
		});
	}
	if cfg.matching.search_deadline_ms == 0 {
		return Err(Error::Validation {
			message: "matching.search_deadline_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	while cfg.providers.embedding.api_base.ends_with('/') {
		cfg.providers.embedding.api_base.pop();
	}
	while cfg.storage.qdrant.url.ends_with('/') {
		cfg.storage.qdrant.url.pop();
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::Map;

	fn test_config() -> Config {
		Config {
			service: Service {
				http_bind: "127.0.0.1:8080".to_string(),
				log_level: "info".to_string(),
				allow_public_bind: false,
			},
			storage: Storage {
				postgres: Postgres {
					dsn: "postgres://beacon@127.0.0.1/beacon".to_string(),
					pool_max_conns: 5,
				},
				redis: Redis { url: "redis://127.0.0.1:6379".to_string(), op_timeout_ms: 1_000 },
				qdrant: Qdrant {
					url: "http://127.0.0.1:6334".to_string(),
					collection: "capabilities".to_string(),
					vector_dim: 384,
					timeout_ms: 2_000,
				},
			},
			providers: Providers {
				embedding: EmbeddingProviderConfig {
					provider_id: "test".to_string(),
					api_base: "http://127.0.0.1:1".to_string(),
					api_key: "key".to_string(),
					path: "/v1/embeddings".to_string(),
					model: "test-embed".to_string(),
					dimensions: 384,
					timeout_ms: 1_000,
					default_headers: Map::new(),
				},
			},
			presence: Presence { ttl_seconds: 60, scan_count: 500 },
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

	#[test]
	fn accepts_reference_config() {
		assert!(validate(&test_config()).is_ok());
	}

	#[test]
	fn rejects_dimension_mismatch() {
		let mut cfg = test_config();

		cfg.providers.embedding.dimensions = 768;

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn rejects_alpha_outside_unit_interval() {
		let mut cfg = test_config();

		cfg.matching.alpha = 1.2;

		assert!(validate(&cfg).is_err());

		cfg.matching.alpha = f64::NAN;

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn rejects_zero_ttl() {
		let mut cfg = test_config();

		cfg.presence.ttl_seconds = 0;

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn rejects_max_top_k_below_default() {
		let mut cfg = test_config();

		cfg.matching.max_top_k = 10;

		assert!(validate(&cfg).is_err());
	}

	#[test]
	fn normalize_strips_trailing_slashes() {
		let mut cfg = test_config();

		cfg.providers.embedding.api_base = "http://127.0.0.1:1/".to_string();
		cfg.storage.qdrant.url = "http://127.0.0.1:6334//".to_string();

		normalize(&mut cfg);

		assert_eq!(cfg.providers.embedding.api_base, "http://127.0.0.1:1");
		assert_eq!(cfg.storage.qdrant.url, "http://127.0.0.1:6334");
	}

	#[test]
	fn parses_full_toml_document() {
		let raw = r#"
[service]
http_bind = "127.0.0.1:8080"
log_level = "info"

[storage.postgres]
dsn            = "postgres://beacon@127.0.0.1/beacon"
pool_max_conns = 5

[storage.redis]
url           = "redis://127.0.0.1:6379"
op_timeout_ms = 1000

[storage.qdrant]
url        = "http://127.0.0.1:6334"
collection = "capabilities"
vector_dim = 384
timeout_ms = 2000

[providers.embedding]
provider_id     = "openai"
api_base        = "https://api.openai.com"
api_key         = "sk-test"
path            = "/v1/embeddings"
model           = "text-embedding-3-small"
dimensions      = 384
timeout_ms      = 10000
default_headers = {}

[presence]
ttl_seconds = 60
scan_count  = 500

[matching]
alpha              = 0.7
score_floor        = 0.5
default_top_k      = 20
max_top_k          = 100
default_range_m    = 10000.0
search_deadline_ms = 10000
"#;
		let cfg: Config = toml::from_str(raw).expect("parse failed");

		assert!(validate(&cfg).is_ok());
		assert_eq!(cfg.presence.ttl_seconds, 60);
		assert_eq!(cfg.matching.default_top_k, 20);
		assert!(!cfg.service.allow_public_bind);
	}
}
