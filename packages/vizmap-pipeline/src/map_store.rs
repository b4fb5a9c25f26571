//! In-memory registry of finished maps, indexed by the stage hashes so a new
//! request can skip every stage an earlier map already computed.

use std::{
	collections::HashMap,
	sync::{Arc, RwLock},
};

use crate::{
	params::{ItemKey, MapItem, PipelineParameters},
	rerank::RerankOutcome,
};

/// A fully built map plus everything needed to resume a partially matching
/// request from the latest shared stage.
#[derive(Clone, Debug)]
pub struct MapArtifact {
	pub map_id: String,
	pub parameters: PipelineParameters,
	pub search_hash: String,
	pub vectorize_hash: String,
	pub projection_hash: String,
	pub sorted_ids: Vec<ItemKey>,
	pub items: HashMap<ItemKey, MapItem>,
	pub scores: Vec<f32>,
	pub vectors: Vec<Vec<f32>>,
	pub positions: Vec<Vec<f32>>,
	pub rerank: Option<RerankOutcome>,
	pub finished: bool,
}

#[derive(Default)]
struct Inner {
	maps: HashMap<String, Arc<MapArtifact>>,
	// Stage hash -> map ids that completed that stage, insertion order.
	vectorize_index: HashMap<String, Vec<String>>,
	projection_index: HashMap<String, Vec<String>>,
}

#[derive(Default)]
pub struct MapStore {
	inner: RwLock<Inner>,
}

impl MapArtifact {
	/// An empty search yields a finished map with no items rather than an
	/// error, so callers can render "no results" like any other map.
	pub fn empty(
		map_id: String,
		parameters: PipelineParameters,
		search_hash: String,
		vectorize_hash: String,
		projection_hash: String,
	) -> Self {
		Self {
			map_id,
			parameters,
			search_hash,
			vectorize_hash,
			projection_hash,
			sorted_ids: Vec::new(),
			items: HashMap::new(),
			scores: Vec::new(),
			vectors: Vec::new(),
			positions: Vec::new(),
			rerank: None,
			finished: true,
		}
	}
}

impl MapStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, map_id: &str) -> Option<Arc<MapArtifact>> {
		let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());

		inner.maps.get(map_id).cloned()
	}

	pub fn insert(&self, artifact: MapArtifact) -> Arc<MapArtifact> {
		let artifact = Arc::new(artifact);
		let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());

		inner
			.vectorize_index
			.entry(artifact.vectorize_hash.clone())
			.or_default()
			.push(artifact.map_id.clone());
		inner
			.projection_index
			.entry(artifact.projection_hash.clone())
			.or_default()
			.push(artifact.map_id.clone());
		inner.maps.insert(artifact.map_id.clone(), artifact.clone());

		artifact
	}

	/// The best map to resume from: one sharing the projection stage hash wins
	/// over one sharing only the vectorize stage hash, because it lets the new
	/// request reuse the coordinates as well as the vectors.
	pub fn find_similar(
		&self,
		vectorize_hash: &str,
		projection_hash: &str,
	) -> Option<Arc<MapArtifact>> {
		let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());
		let lookup = |index: &HashMap<String, Vec<String>>, hash: &str| {
			index
				.get(hash)
				.and_then(|ids| ids.iter().rev().find_map(|id| inner.maps.get(id)))
				.filter(|artifact| artifact.finished)
				.cloned()
		};

		lookup(&inner.projection_index, projection_hash)
			.or_else(|| lookup(&inner.vectorize_index, vectorize_hash))
	}

	pub fn len(&self) -> usize {
		let inner = self.inner.read().unwrap_or_else(|p| p.into_inner());

		inner.maps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());

		inner.maps.clear();
		inner.vectorize_index.clear();
		inner.projection_index.clear();
	}
}
