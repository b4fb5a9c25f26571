//! Map orchestration. Each request walks the stage chain search -> rerank ->
//! vectorize -> project, skipping every stage whose hash matches a previously
//! finished map.

use std::{collections::HashMap, sync::Arc};

use crate::{
	Error, ItemKey, MapArtifact, MapItem, MapPipeline, PipelineParameters, RerankOutcome, Result,
	stage::{
		map_parameters_hash, projection_stage_hash, search_stage_hash, stage_key_prefix,
		vectorize_stage_hash,
	},
};

impl MapPipeline {
	/// Builds (or returns) the map for `params`. `ignore_cache` forces every
	/// stage to recompute and still registers the result for later requests.
	pub async fn build_map(
		&self,
		params: PipelineParameters,
		ignore_cache: bool,
	) -> Result<Arc<MapArtifact>> {
		let query = params
			.query()
			.ok_or_else(|| Error::InvalidRequest {
				message: "The search parameter group must contain a string `query`.".into(),
			})?
			.to_owned();
		let search_hash = search_stage_hash(&params)?;
		let vectorize_hash = vectorize_stage_hash(&params)?;
		let projection_hash = projection_stage_hash(&params)?;
		let map_id = map_parameters_hash(&params)?;

		if !ignore_cache
			&& let Some(existing) = self.map_store.get(&map_id)
		{
			tracing::info!(
				map_id_prefix = stage_key_prefix(&map_id),
				"Returning a previously computed map."
			);

			return Ok(existing);
		}

		let similar =
			if ignore_cache { None } else { self.map_store.find_similar(&vectorize_hash, &projection_hash) };
		let (sorted_ids, mut items, reused_vectors, rerank) =
			self.search_stage(&query, &params, &vectorize_hash, similar.as_deref()).await?;

		if sorted_ids.is_empty() {
			tracing::info!(
				map_id_prefix = stage_key_prefix(&map_id),
				"Search returned no items, registering an empty map."
			);

			return Ok(self.map_store.insert(MapArtifact::empty(
				map_id,
				params,
				search_hash,
				vectorize_hash,
				projection_hash,
			)));
		}

		let vectors = match reused_vectors {
			Some(vectors) => vectors,
			None => {
				let vectors = self.vectorize_items(&query, &sorted_ids, &mut items).await?;

				if let Err(error) = self.flush_embedding_cache() {
					tracing::warn!(?error, "Embedding cache flush failed.");
				}

				vectors
			},
		};
		let positions = match similar.as_deref() {
			Some(artifact) if artifact.projection_hash == projection_hash => {
				tracing::info!(
					stage = "projection",
					reused_from = stage_key_prefix(&artifact.map_id),
					"Reusing coordinates from a matching map."
				);

				artifact.positions.clone()
			},
			_ => {
				let parameters = self.projection.parameters(&params.projection);

				self.projection.project(&vectors, &parameters).await?
			},
		};
		let scores =
			sorted_ids.iter().map(|key| items.get(key).map_or(0., |item| item.score)).collect();
		let artifact = MapArtifact {
			map_id,
			parameters: params,
			search_hash,
			vectorize_hash,
			projection_hash,
			sorted_ids,
			items,
			scores,
			vectors,
			positions,
			rerank,
			finished: true,
		};

		tracing::info!(
			map_id_prefix = stage_key_prefix(&artifact.map_id),
			items = artifact.sorted_ids.len(),
			"Map finished."
		);

		Ok(self.map_store.insert(artifact))
	}

	/// Runs search plus rerank, or reuses both (together with the vectors and
	/// scores) from a finished map whose vectorize stage hash matches.
	async fn search_stage(
		&self,
		query: &str,
		params: &PipelineParameters,
		vectorize_hash: &str,
		similar: Option<&MapArtifact>,
	) -> Result<(
		Vec<ItemKey>,
		HashMap<ItemKey, MapItem>,
		Option<Vec<Vec<f32>>>,
		Option<RerankOutcome>,
	)> {
		if let Some(artifact) = similar
			&& artifact.vectorize_hash == vectorize_hash
		{
			tracing::info!(
				stage = "search",
				reused_from = stage_key_prefix(&artifact.map_id),
				items = artifact.sorted_ids.len(),
				"Reusing ranking and vectors from a matching map."
			);

			return Ok((
				artifact.sorted_ids.clone(),
				artifact.items.clone(),
				Some(artifact.vectors.clone()),
				artifact.rerank,
			));
		}

		let results = self.providers.search.search(&params.search).await?;

		tracing::info!(stage = "search", items = results.sorted_ids.len(), "Search stage complete.");

		if results.sorted_ids.is_empty() {
			return Ok((results.sorted_ids, results.items, None, None));
		}

		let mut items = results.items;
		let top_n = self.cfg.pipeline.rerank_top_n as usize;
		let (sorted_ids, outcome) =
			self.rerank(query, results.sorted_ids, &mut items, top_n).await?;

		tracing::info!(stage = "rerank", outcome = ?outcome, top_n, "Rerank stage complete.");

		Ok((sorted_ids, items, None, Some(outcome)))
	}
}
