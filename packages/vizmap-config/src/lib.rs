mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Cache, Chunking, Config, EmbeddingProviderConfig, Pipeline, ProjectionDefaults,
	ProjectionProviderConfig, ProviderConfig, Providers, Service,
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
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.strategy.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.embedding.strategy must be non-empty.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("rerank", &cfg.providers.rerank.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if !(2..=3).contains(&cfg.providers.projection.reduced_dimensions) {
		return Err(Error::Validation {
			message: "providers.projection.reduced_dimensions must be 2 or 3.".to_string(),
		});
	}
	if cfg.providers.projection.defaults.min_dist < 0.0
		|| !cfg.providers.projection.defaults.min_dist.is_finite()
	{
		return Err(Error::Validation {
			message: "providers.projection.defaults.min_dist must be a finite number of zero or greater."
				.to_string(),
		});
	}
	if cfg.providers.projection.defaults.n_epochs == 0 {
		return Err(Error::Validation {
			message: "providers.projection.defaults.n_epochs must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.projection.defaults.n_neighbors == 0 {
		return Err(Error::Validation {
			message: "providers.projection.defaults.n_neighbors must be greater than zero."
				.to_string(),
		});
	}
	if cfg.providers.projection.defaults.metric.trim().is_empty() {
		return Err(Error::Validation {
			message: "providers.projection.defaults.metric must be non-empty.".to_string(),
		});
	}
	if cfg.chunking.window_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.window_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_chars >= cfg.chunking.window_chars {
		return Err(Error::Validation {
			message: "chunking.overlap_chars must be less than chunking.window_chars.".to_string(),
		});
	}
	if cfg.cache.rerank_ttl_days <= 0 {
		return Err(Error::Validation {
			message: "cache.rerank_ttl_days must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.batch_size == 0 {
		return Err(Error::Validation {
			message: "pipeline.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_concurrent_batches == 0 {
		return Err(Error::Validation {
			message: "pipeline.max_concurrent_batches must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.rerank_top_n == 0 {
		return Err(Error::Validation {
			message: "pipeline.rerank_top_n must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.cache
		.embedding_cache_path
		.as_deref()
		.map(|path| path.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.cache.embedding_cache_path = None;
	}
	if cfg.cache.rerank_cache_dir.as_deref().map(|dir| dir.trim().is_empty()).unwrap_or(false) {
		cfg.cache.rerank_cache_dir = None;
	}
	if cfg
		.providers
		.projection
		.gpu_api_base
		.as_deref()
		.map(|base| base.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.projection.gpu_api_base = None;
	}
}
