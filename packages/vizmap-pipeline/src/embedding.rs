//! Vectorize stage: chunk each item's text, embed the chunks in bounded
//! concurrent batches, mean-pool per item, and score against the query.
//!
//! Item vectors are cached under the `{model}:{strategy}` namespace keyed by
//! `{dataset_id}:{item_id}`, so re-running a search only embeds items the
//! cache has never seen. Query embeddings are never cached.

use std::collections::HashMap;

use vizmap_chunking::{ChunkingConfig, chunk_text};
use vizmap_providers::batching::run_in_batches_bounded;

use crate::{Error, ItemKey, MapItem, MapPipeline, Result};

impl MapPipeline {
	/// Embeds every text through the bounded batch runner, preserving input
	/// order. Any batch failure fails the whole call.
	pub(crate) async fn embed_texts(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
		if texts.is_empty() {
			return Ok(Vec::new());
		}

		let provider = self.providers.embedding.clone();
		let cfg = self.cfg.providers.embedding.clone();
		let expected_dimensions = cfg.dimensions as usize;
		let vectors = run_in_batches_bounded(
			texts,
			self.cfg.pipeline.batch_size as usize,
			self.cfg.pipeline.max_concurrent_batches as usize,
			move |batch: Vec<String>| {
				let provider = provider.clone();
				let cfg = cfg.clone();

				async move { provider.embed(&cfg, &batch).await }
			},
		)
		.await?;

		if let Some(vector) = vectors.iter().find(|v| v.len() != expected_dimensions) {
			return Err(Error::Provider {
				message: format!(
					"Embedding backend returned {}-dimensional vectors, expected {expected_dimensions}.",
					vector.len()
				),
			});
		}

		Ok(vectors)
	}

	/// One embedding for a single text. With an `item_id` the cache is
	/// consulted first and the fresh vector stored back.
	pub async fn get_embedding(&self, text: &str, item_id: Option<&str>) -> Result<Vec<f32>> {
		let namespace = self.embedding_namespace();

		if let Some(id) = item_id
			&& let Some(vector) = self.embedding_cache.get(&namespace, id)
		{
			tracing::debug!(cache_kind = "embedding", item_id = id, hit = true, "Cache hit.");

			return Ok(vector);
		}

		let mut vectors = self.embed_texts(vec![text.to_owned()]).await?;
		let vector = vectors.pop().ok_or_else(|| Error::Provider {
			message: "Embedding backend returned no vector for a non-empty input.".into(),
		})?;

		if let Some(id) = item_id {
			self.embedding_cache.put(&namespace, id.to_owned(), vector.clone());
		}

		Ok(vector)
	}

	/// Produces one vector per ranked item, reusing cached item vectors, and
	/// sets each item's score to its dot product with the query embedding.
	pub(crate) async fn vectorize_items(
		&self,
		query: &str,
		sorted_ids: &[ItemKey],
		items: &mut HashMap<ItemKey, MapItem>,
	) -> Result<Vec<Vec<f32>>> {
		let namespace = self.embedding_namespace();
		let chunking = ChunkingConfig {
			window_chars: self.cfg.chunking.window_chars,
			overlap_chars: self.cfg.chunking.overlap_chars,
		};
		let dimensions = self.cfg.providers.embedding.dimensions as usize;
		let mut vectors: Vec<Option<Vec<f32>>> = vec![None; sorted_ids.len()];
		// (position in sorted_ids, chunk range within `chunks`) per cache miss.
		let mut pending = Vec::new();
		let mut chunks = Vec::new();

		for (position, key) in sorted_ids.iter().enumerate() {
			if let Some(vector) = self.embedding_cache.get(&namespace, &key.to_string()) {
				vectors[position] = Some(vector);

				continue;
			}

			let item = items.get(key).ok_or_else(|| Error::InvalidRequest {
				message: format!("Ranked item {key} is missing from the result set."),
			})?;
			let start = chunks.len();

			chunks.extend(chunk_text(&item.text, &chunking)?);
			pending.push((position, start..chunks.len()));
		}

		tracing::info!(
			cache_kind = "embedding",
			hits = sorted_ids.len() - pending.len(),
			misses = pending.len(),
			chunks = chunks.len(),
			"Vectorize stage cache usage."
		);

		let embedded = self.embed_texts(chunks).await?;

		for (position, range) in pending {
			let vector = mean_pool(&embedded[range], dimensions);

			self.embedding_cache.put(&namespace, sorted_ids[position].to_string(), vector.clone());
			vectors[position] = Some(vector);
		}

		let query_vector = self.get_embedding(query, None).await?;
		let mut out = Vec::with_capacity(vectors.len());

		for (position, vector) in vectors.into_iter().enumerate() {
			let vector = vector.ok_or_else(|| Error::Storage {
				message: format!("No vector was produced for item {}.", sorted_ids[position]),
			})?;

			if let Some(item) = items.get_mut(&sorted_ids[position]) {
				item.score = dot(&query_vector, &vector);
			}

			out.push(vector);
		}

		Ok(out)
	}
}

/// Element-wise mean of the chunk vectors; an item whose text produced no
/// chunks gets the zero vector.
fn mean_pool(chunk_vectors: &[Vec<f32>], dimensions: usize) -> Vec<f32> {
	if chunk_vectors.is_empty() {
		return vec![0.; dimensions];
	}

	let mut pooled = vec![0.; dimensions];

	for vector in chunk_vectors {
		for (sum, component) in pooled.iter_mut().zip(vector) {
			*sum += component;
		}
	}

	let count = chunk_vectors.len() as f32;

	pooled.iter_mut().for_each(|sum| *sum /= count);

	pooled
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
	a.iter().zip(b).map(|(x, y)| x * y).sum()
}
