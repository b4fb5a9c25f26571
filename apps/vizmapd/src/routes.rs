use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};
use vizmap_pipeline::{Error, MapArtifact, PipelineParameters, ProvenanceEntry};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/api/map", post(build_map))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn build_map(
	State(state): State<AppState>,
	Json(payload): Json<MapRequest>,
) -> Result<Json<MapResponse>, ApiError> {
	let map = state.pipeline.build_map(payload.parameters, payload.ignore_cache).await?;

	Ok(Json(MapResponse::from_artifact(&map)))
}

#[derive(Debug, Deserialize)]
pub struct MapRequest {
	#[serde(flatten)]
	pub parameters: PipelineParameters,
	#[serde(default)]
	pub ignore_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct MapResponse {
	pub map_id: String,
	pub finished: bool,
	pub points: Vec<MapPoint>,
}

/// One ranked item with its reduced coordinates, in ranking order.
#[derive(Debug, Serialize)]
pub struct MapPoint {
	pub dataset_id: i32,
	pub item_id: String,
	pub score: f32,
	pub position: Vec<f32>,
	pub provenance: Vec<ProvenanceEntry>,
}

impl MapResponse {
	pub fn from_artifact(map: &MapArtifact) -> Self {
		let points = map
			.sorted_ids
			.iter()
			.enumerate()
			.map(|(position, key)| MapPoint {
				dataset_id: key.dataset_id,
				item_id: key.item_id.clone(),
				score: map.scores.get(position).copied().unwrap_or_default(),
				position: map.positions.get(position).cloned().unwrap_or_default(),
				provenance: map
					.items
					.get(key)
					.map(|item| item.provenance.clone())
					.unwrap_or_default(),
			})
			.collect();

		Self { map_id: map.map_id.clone(), finished: map.finished, points }
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
}

impl From<Error> for ApiError {
	fn from(error: Error) -> Self {
		let (status, error_code) = match &error {
			Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
			Error::Provider { .. } => (StatusCode::BAD_GATEWAY, "provider_error"),
			Error::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
			Error::Storage { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "storage_error"),
		};

		Self { status, error_code, message: error.to_string() }
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code.to_owned(), message: self.message };

		(self.status, Json(body)).into_response()
	}
}
