//! Stage hash chain: each stage key is a content hash of the cumulative
//! parameter prefix, so an unchanged upstream prefix keeps its cache key no
//! matter what changes downstream.

use serde_json::Value;

use crate::{Error, PipelineParameters, Result};

const STAGE_KEY_SCHEMA_VERSION: i32 = 1;

pub fn search_stage_hash(params: &PipelineParameters) -> Result<String> {
	hash_cache_key(&serde_json::json!({
		"schema_version": STAGE_KEY_SCHEMA_VERSION,
		"search": params.search,
	}))
}

pub fn vectorize_stage_hash(params: &PipelineParameters) -> Result<String> {
	hash_cache_key(&serde_json::json!({
		"schema_version": STAGE_KEY_SCHEMA_VERSION,
		"search": params.search,
		"vectorize": params.vectorize,
	}))
}

pub fn projection_stage_hash(params: &PipelineParameters) -> Result<String> {
	hash_cache_key(&serde_json::json!({
		"schema_version": STAGE_KEY_SCHEMA_VERSION,
		"search": params.search,
		"vectorize": params.vectorize,
		"projection": params.projection,
	}))
}

/// Identity of the whole map, covering the render group as well.
pub fn map_parameters_hash(params: &PipelineParameters) -> Result<String> {
	hash_cache_key(&serde_json::json!({
		"schema_version": STAGE_KEY_SCHEMA_VERSION,
		"search": params.search,
		"vectorize": params.vectorize,
		"projection": params.projection,
		"render": params.render,
	}))
}

/// `serde_json::Value` objects are BTreeMap-backed, so `to_vec` emits mapping
/// keys in sorted order and the digest is independent of insertion order.
pub(crate) fn hash_cache_key(payload: &Value) -> Result<String> {
	let raw = serde_json::to_vec(payload).map_err(|err| Error::Storage {
		message: format!("Failed to encode stage key payload: {err}"),
	})?;

	Ok(blake3::hash(&raw).to_hex().to_string())
}

pub fn stage_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn params(search_extra: Option<(&str, i64)>, projection_epochs: i64) -> PipelineParameters {
		let mut params = PipelineParameters::default();

		params.search.insert("query".to_string(), serde_json::json!("solar cells"));
		params.search.insert("dataset_ids".to_string(), serde_json::json!([1, 2]));

		if let Some((key, value)) = search_extra {
			params.search.insert(key.to_string(), serde_json::json!(value));
		}

		params.vectorize.insert("model".to_string(), serde_json::json!("e5-base-v2"));
		params.projection.insert("n_epochs".to_string(), serde_json::json!(projection_epochs));

		params
	}

	#[test]
	fn projection_change_leaves_upstream_keys_unchanged() {
		let p1 = params(None, 500);
		let p2 = params(None, 900);

		assert_eq!(search_stage_hash(&p1).unwrap(), search_stage_hash(&p2).unwrap());
		assert_eq!(vectorize_stage_hash(&p1).unwrap(), vectorize_stage_hash(&p2).unwrap());
		assert_ne!(projection_stage_hash(&p1).unwrap(), projection_stage_hash(&p2).unwrap());
		assert_ne!(map_parameters_hash(&p1).unwrap(), map_parameters_hash(&p2).unwrap());
	}

	#[test]
	fn search_change_shifts_every_key() {
		let p1 = params(None, 500);
		let p2 = params(Some(("limit", 100)), 500);

		assert_ne!(search_stage_hash(&p1).unwrap(), search_stage_hash(&p2).unwrap());
		assert_ne!(vectorize_stage_hash(&p1).unwrap(), vectorize_stage_hash(&p2).unwrap());
		assert_ne!(projection_stage_hash(&p1).unwrap(), projection_stage_hash(&p2).unwrap());
	}

	#[test]
	fn render_change_preserves_stage_keys_but_not_map_identity() {
		let p1 = params(None, 500);
		let mut p2 = params(None, 500);

		p2.render.insert("point_size".to_string(), serde_json::json!(3));

		assert_eq!(projection_stage_hash(&p1).unwrap(), projection_stage_hash(&p2).unwrap());
		assert_ne!(map_parameters_hash(&p1).unwrap(), map_parameters_hash(&p2).unwrap());
	}

	#[test]
	fn hashing_is_insertion_order_independent() {
		let mut a = PipelineParameters::default();
		let mut b = PipelineParameters::default();

		a.search.insert("query".to_string(), serde_json::json!("q"));
		a.search.insert("filters".to_string(), serde_json::json!({ "year": 2024, "open": true }));
		b.search.insert("filters".to_string(), serde_json::json!({ "open": true, "year": 2024 }));
		b.search.insert("query".to_string(), serde_json::json!("q"));

		assert_eq!(search_stage_hash(&a).unwrap(), search_stage_hash(&b).unwrap());
	}

	#[test]
	fn keys_are_stable_across_calls() {
		let p = params(None, 500);

		assert_eq!(projection_stage_hash(&p).unwrap(), projection_stage_hash(&p).unwrap());
		assert_eq!(search_stage_hash(&p).unwrap().len(), 64);
	}

	#[test]
	fn prefix_is_bounded() {
		assert_eq!(stage_key_prefix("abcdef"), "abcdef");
		assert_eq!(stage_key_prefix("0123456789abcdef"), "0123456789ab");
	}
}
