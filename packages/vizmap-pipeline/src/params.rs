use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque mapping from option name to value. Only presence and equality
/// matter to the pipeline; the groups are forwarded to collaborators as-is.
pub type ParameterGroup = serde_json::Map<String, Value>;

/// Immutable per-request parameter record. `search`, `vectorize`, and
/// `projection` feed the stage hash chain; `render` only contributes to the
/// map identity, so requests differing in render settings alone share every
/// stage result.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PipelineParameters {
	#[serde(default)]
	pub search: ParameterGroup,
	#[serde(default)]
	pub vectorize: ParameterGroup,
	#[serde(default)]
	pub projection: ParameterGroup,
	#[serde(default)]
	pub render: ParameterGroup,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ItemKey {
	pub dataset_id: i32,
	pub item_id: String,
}

/// Which processing step produced or adjusted an item, preserved across
/// stages and never overwritten.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ProvenanceEntry {
	pub kind: String,
	pub query: String,
	pub score: f32,
	pub rank: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct MapItem {
	pub key: ItemKey,
	pub text: String,
	#[serde(default)]
	pub score: f32,
	#[serde(default)]
	pub provenance: Vec<ProvenanceEntry>,
}

impl PipelineParameters {
	pub fn query(&self) -> Option<&str> {
		self.search.get("query").and_then(Value::as_str)
	}
}

impl std::fmt::Display for ItemKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}:{}", self.dataset_id, self.item_id)
	}
}

impl MapItem {
	pub fn new(key: ItemKey, text: impl Into<String>) -> Self {
		Self { key, text: text.into(), score: 0.0, provenance: Vec::new() }
	}
}
