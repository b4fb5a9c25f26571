//! Rerank stage: the head of the ranking is reordered by a cross-encoder
//! backend, with the reordering cached under a key derived from the query and
//! the exact candidate list. Only the head moves; the tail keeps its original
//! relative order and is never annotated.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use time::{Duration, OffsetDateTime};

use crate::{
	ItemKey, MapItem, MapPipeline, ProvenanceEntry, Result,
	stage::{hash_cache_key, stage_key_prefix},
};

const RERANK_CACHE_SCHEMA_VERSION: i32 = 1;
const RERANK_PROVENANCE_KIND: &str = "reranking";

/// How the head ordering was obtained. `Degraded` means the backend failed
/// and the original order was kept; it is surfaced rather than hidden so
/// callers can tell a real reordering from a fallback, and it is never
/// written to the cache.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RerankOutcome {
	Cached,
	Reranked,
	Degraded,
}

/// Cached reordering: positions into the candidate head plus backend scores.
/// Replaying it is valid because the cache key pins the exact candidate list.
#[derive(Debug, Deserialize, Serialize)]
struct RerankCachePayload {
	items: Vec<RerankCacheRow>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
struct RerankCacheRow {
	index: usize,
	score: f32,
}

fn rerank_cache_key(
	query: &str,
	provider_id: &str,
	model: &str,
	head: &[ItemKey],
	top_n: usize,
) -> Result<String> {
	hash_cache_key(&json!({
		"kind": "rerank",
		"schema_version": RERANK_CACHE_SCHEMA_VERSION,
		"query": query.trim(),
		"provider_id": provider_id,
		"model": model,
		"top_n": top_n,
		"candidates": head,
	}))
}

impl MapPipeline {
	/// Reorders the first `top_n` entries of `sorted_ids` and annotates the
	/// moved items with a reranking provenance entry. Provider failure
	/// degrades to the original order instead of failing the request.
	pub(crate) async fn rerank(
		&self,
		query: &str,
		mut sorted_ids: Vec<ItemKey>,
		items: &mut HashMap<ItemKey, MapItem>,
		top_n: usize,
	) -> Result<(Vec<ItemKey>, RerankOutcome)> {
		let head_len = top_n.min(sorted_ids.len());

		if head_len == 0 {
			return Ok((sorted_ids, RerankOutcome::Reranked));
		}

		let head = sorted_ids[..head_len].to_vec();
		let cfg = &self.cfg.providers.rerank;
		let ttl_days = self.cfg.cache.rerank_ttl_days;
		let cache_key = rerank_cache_key(query, &cfg.provider_id, &cfg.model, &head, top_n)?;
		let now = OffsetDateTime::now_utc();
		let cached = match self.rerank_cache.get(&cache_key, now) {
			Ok(Some(value)) => match serde_json::from_value::<RerankCachePayload>(value) {
				Ok(payload)
					if payload.items.len() == head_len
						&& payload.items.iter().all(|row| row.index < head_len) =>
				{
					tracing::info!(
						cache_kind = "rerank",
						cache_key_prefix = stage_key_prefix(&cache_key),
						hit = true,
						"Cache hit."
					);

					Some(payload.items)
				},
				Ok(_) => {
					tracing::warn!(
						cache_kind = "rerank",
						cache_key_prefix = stage_key_prefix(&cache_key),
						"Cached reordering does not cover the candidate head, ignoring it."
					);

					None
				},
				Err(error) => {
					tracing::warn!(
						cache_kind = "rerank",
						cache_key_prefix = stage_key_prefix(&cache_key),
						?error,
						"Failed to decode the cached reordering, ignoring it."
					);

					None
				},
			},
			Ok(None) => {
				tracing::debug!(
					cache_kind = "rerank",
					cache_key_prefix = stage_key_prefix(&cache_key),
					hit = false,
					"Cache miss."
				);

				None
			},
			Err(error) => {
				tracing::warn!(
					cache_kind = "rerank",
					cache_key_prefix = stage_key_prefix(&cache_key),
					?error,
					"Rerank cache read failed, treating as a miss."
				);

				None
			},
		};
		let (rows, outcome) = match cached {
			Some(rows) => (rows, RerankOutcome::Cached),
			None => {
				let docs = head
					.iter()
					.map(|key| items.get(key).map(|item| item.text.clone()).unwrap_or_default())
					.collect::<Vec<_>>();

				match self.providers.rerank.rerank(cfg, query, &docs, head_len).await {
					Ok(results) => {
						let rows = results
							.iter()
							.map(|r| RerankCacheRow { index: r.index, score: r.relevance_score })
							.collect::<Vec<_>>();

						if is_permutation(&rows, head_len) {
							self.store_rerank_rows(&cache_key, &rows, now, ttl_days);

							(rows, RerankOutcome::Reranked)
						} else {
							// A malformed payload counts as a backend failure, not a
							// request failure.
							tracing::warn!(
								candidates = head_len,
								rows = rows.len(),
								"Rerank backend did not return a permutation of the candidates, keeping the original order."
							);

							(identity_rows(head_len), RerankOutcome::Degraded)
						}
					},
					Err(error) => {
						tracing::warn!(
							?error,
							candidates = head_len,
							"Rerank backend call failed, keeping the original order."
						);

						(identity_rows(head_len), RerankOutcome::Degraded)
					},
				}
			},
		};

		for (rank, row) in rows.iter().enumerate() {
			let key = head[row.index].clone();

			if let Some(item) = items.get_mut(&key) {
				item.provenance.push(ProvenanceEntry {
					kind: RERANK_PROVENANCE_KIND.to_owned(),
					query: query.to_owned(),
					score: row.score,
					rank: rank as u32 + 1,
				});
			}

			sorted_ids[rank] = key;
		}

		Ok((sorted_ids, outcome))
	}

	/// Cache write failures are logged and swallowed; the reordering itself
	/// already succeeded.
	fn store_rerank_rows(
		&self,
		cache_key: &str,
		rows: &[RerankCacheRow],
		now: OffsetDateTime,
		ttl_days: i64,
	) {
		let payload = match serde_json::to_value(RerankCachePayload { items: rows.to_vec() }) {
			Ok(payload) => payload,
			Err(error) => {
				tracing::warn!(?error, "Failed to encode the reordering for the rerank cache.");

				return;
			},
		};

		if let Err(error) =
			self.rerank_cache.set(cache_key, payload, now, now + Duration::days(ttl_days))
		{
			tracing::warn!(
				cache_kind = "rerank",
				cache_key_prefix = stage_key_prefix(cache_key),
				?error,
				"Rerank cache write failed."
			);
		} else {
			tracing::info!(
				cache_kind = "rerank",
				cache_key_prefix = stage_key_prefix(cache_key),
				ttl_days,
				"Stored reordering in the rerank cache."
			);
		}
	}
}

/// Zero-score identity reordering; deliberately never cached so the next
/// request retries the backend.
fn identity_rows(head_len: usize) -> Vec<RerankCacheRow> {
	(0..head_len).map(|index| RerankCacheRow { index, score: 0. }).collect()
}

fn is_permutation(rows: &[RerankCacheRow], head_len: usize) -> bool {
	let mut seen = vec![false; head_len];

	rows.len() == head_len
		&& rows.iter().all(|row| row.index < head_len && !std::mem::replace(&mut seen[row.index], true))
}

#[cfg(test)]
mod tests {
	use super::*;

	fn rows(indices: &[usize]) -> Vec<RerankCacheRow> {
		indices.iter().map(|&index| RerankCacheRow { index, score: 0. }).collect()
	}

	#[test]
	fn permutation_check() {
		assert!(is_permutation(&rows(&[2, 0, 1]), 3));
		assert!(!is_permutation(&rows(&[0, 0, 1]), 3));
		assert!(!is_permutation(&rows(&[0, 1]), 3));
		assert!(!is_permutation(&rows(&[0, 1, 3]), 3));
	}

	#[test]
	fn cache_key_pins_query_candidates_and_backend() {
		let head = vec![
			ItemKey { dataset_id: 1, item_id: "a".into() },
			ItemKey { dataset_id: 1, item_id: "b".into() },
		];
		let key = |query: &str, model: &str, head: &[ItemKey]| {
			rerank_cache_key(query, "cohere", model, head, 10).unwrap()
		};

		assert_eq!(key("q", "m", &head), key(" q ", "m", &head));
		assert_ne!(key("q", "m", &head), key("other", "m", &head));
		assert_ne!(key("q", "m", &head), key("q", "m2", &head));
		assert_ne!(key("q", "m", &head), key("q", "m", &head[..1]));
	}
}
