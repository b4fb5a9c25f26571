use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use vizmap_config::{Config, Error};

const SAMPLE_CONFIG_TOML: &str = include_str!("../../../vizmap.example.toml");

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("vizmap_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

#[test]
fn example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../vizmap.example.toml");

	vizmap_config::load(&path).expect("Expected vizmap.example.toml to be a valid config.");
}

#[test]
fn chunking_overlap_must_be_less_than_window() {
	let mut cfg = base_config();

	cfg.chunking.overlap_chars = cfg.chunking.window_chars;

	let err = vizmap_config::validate(&cfg).expect_err("Expected chunking validation error.");

	assert!(
		err.to_string().contains("chunking.overlap_chars must be less than chunking.window_chars."),
		"Unexpected error: {err}"
	);

	cfg = base_config();
	cfg.chunking.overlap_chars = cfg.chunking.window_chars + 1;

	assert!(vizmap_config::validate(&cfg).is_err());
}

#[test]
fn chunking_window_must_be_positive() {
	let mut cfg = base_config();

	cfg.chunking.window_chars = 0;

	let err = vizmap_config::validate(&cfg).expect_err("Expected chunking validation error.");

	assert!(
		err.to_string().contains("chunking.window_chars must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn rerank_ttl_must_be_positive() {
	let mut cfg = base_config();

	cfg.cache.rerank_ttl_days = 0;

	let err = vizmap_config::validate(&cfg).expect_err("Expected cache TTL validation error.");

	assert!(
		err.to_string().contains("cache.rerank_ttl_days must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn reduced_dimensions_must_be_two_or_three() {
	let mut cfg = base_config();

	cfg.providers.projection.reduced_dimensions = 1;

	assert!(vizmap_config::validate(&cfg).is_err());

	cfg = base_config();
	cfg.providers.projection.reduced_dimensions = 3;

	assert!(vizmap_config::validate(&cfg).is_ok());

	cfg = base_config();
	cfg.providers.projection.reduced_dimensions = 4;

	assert!(vizmap_config::validate(&cfg).is_err());
}

#[test]
fn projection_defaults_require_valid_bounds() {
	let mut cfg = base_config();

	cfg.providers.projection.defaults.n_neighbors = 0;

	assert!(vizmap_config::validate(&cfg).is_err());

	cfg = base_config();
	cfg.providers.projection.defaults.min_dist = f64::NAN;

	assert!(vizmap_config::validate(&cfg).is_err());

	cfg = base_config();
	cfg.providers.projection.defaults.metric = "  ".to_string();

	assert!(vizmap_config::validate(&cfg).is_err());
}

#[test]
fn provider_api_keys_must_be_non_empty() {
	let mut cfg = base_config();

	cfg.providers.rerank.api_key = "   ".to_string();

	let err = vizmap_config::validate(&cfg).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("Provider rerank api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn pipeline_bounds_must_be_positive() {
	let mut cfg = base_config();

	cfg.pipeline.batch_size = 0;

	assert!(vizmap_config::validate(&cfg).is_err());

	cfg = base_config();
	cfg.pipeline.max_concurrent_batches = 0;

	assert!(vizmap_config::validate(&cfg).is_err());

	cfg = base_config();
	cfg.pipeline.rerank_top_n = 0;

	assert!(vizmap_config::validate(&cfg).is_err());
}

#[test]
fn load_normalizes_empty_optional_paths() {
	let payload = SAMPLE_CONFIG_TOML
		.replace("embedding_cache_path = \"data/embedding_cache.json\"", "embedding_cache_path = \"  \"")
		.replace("rerank_cache_dir     = \"data/rerank_cache\"", "rerank_cache_dir     = \"\"");
	let path = write_temp_config(payload);
	let cfg = vizmap_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = cfg.expect("Expected config to load.");

	assert!(cfg.cache.embedding_cache_path.is_none());
	assert!(cfg.cache.rerank_cache_dir.is_none());
}

#[test]
fn missing_strategy_is_a_parse_error() {
	let payload = SAMPLE_CONFIG_TOML.replace("strategy        = \"mean\"\n", "");
	let path = write_temp_config(payload);
	let err = vizmap_config::load(&path).expect_err("Expected missing strategy parse error.");

	fs::remove_file(&path).expect("Failed to remove test config.");

	let message = match err {
		Error::ParseConfig { source, .. } => source.to_string(),
		err => panic!("Expected parse config error, got {err}"),
	};

	assert!(message.contains("missing field `strategy`"), "Unexpected error: {message}");
}
