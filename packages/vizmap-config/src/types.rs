use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub providers: Providers,
	pub chunking: Chunking,
	pub cache: Cache,
	pub pipeline: Pipeline,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub rerank: ProviderConfig,
	pub projection: ProjectionProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Pooling strategy forwarded to the backend and part of the cache namespace,
	/// e.g. "sep_token" or "mean".
	pub strategy: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionProviderConfig {
	/// Optional GPU-accelerated endpoint, probed once at startup.
	pub gpu_api_base: Option<String>,
	pub api_base: String,
	pub path: String,
	#[serde(default = "default_health_path")]
	pub health_path: String,
	pub timeout_ms: u64,
	pub reduced_dimensions: u32,
	pub defaults: ProjectionDefaults,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectionDefaults {
	pub min_dist: f64,
	pub n_epochs: u32,
	pub n_neighbors: u32,
	pub metric: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chunking {
	pub window_chars: u32,
	pub overlap_chars: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cache {
	pub embedding_cache_path: Option<String>,
	pub rerank_cache_dir: Option<String>,
	#[serde(default = "default_rerank_ttl_days")]
	pub rerank_ttl_days: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pipeline {
	pub batch_size: u32,
	#[serde(default = "default_max_concurrent_batches")]
	pub max_concurrent_batches: u32,
	#[serde(default = "default_rerank_top_n")]
	pub rerank_top_n: u32,
}

fn default_health_path() -> String {
	"/health".to_string()
}

fn default_rerank_ttl_days() -> i64 {
	28
}

fn default_max_concurrent_batches() -> u32 {
	4
}

fn default_rerank_top_n() -> u32 {
	10
}
