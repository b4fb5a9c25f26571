//! Dimensionality-reduction stage. The reducer itself runs out of process;
//! this service picks its endpoint once at construction and guards the inputs
//! the reducer cannot handle.

use std::sync::Arc;

use serde_json::Value;
use vizmap_config::ProjectionProviderConfig;
use vizmap_providers::projection::ProjectionParameters;

use crate::{ParameterGroup, ProjectionProvider, Result};

pub struct ProjectionService {
	cfg: ProjectionProviderConfig,
	api_base: String,
	provider: Arc<dyn ProjectionProvider>,
}

impl ProjectionService {
	/// Probes the GPU endpoint's health route once and falls back to the CPU
	/// endpoint if it is absent or unreachable. The choice sticks for the
	/// lifetime of the service.
	pub async fn select(cfg: ProjectionProviderConfig, provider: Arc<dyn ProjectionProvider>) -> Self {
		let api_base = match cfg.gpu_api_base.as_deref() {
			Some(gpu_api_base) => match provider.probe_health(gpu_api_base, &cfg).await {
				Ok(()) => {
					tracing::info!(endpoint = gpu_api_base, "Using the GPU projection backend.");

					gpu_api_base.to_owned()
				},
				Err(error) => {
					tracing::warn!(
						endpoint = gpu_api_base,
						?error,
						"GPU projection backend is unreachable, falling back to the CPU backend."
					);

					cfg.api_base.clone()
				},
			},
			None => cfg.api_base.clone(),
		};

		Self { cfg, api_base, provider }
	}

	pub fn api_base(&self) -> &str {
		&self.api_base
	}

	/// Merges the request's projection parameter group over the configured
	/// defaults. Unknown keys in the group are ignored here but still feed the
	/// projection stage hash.
	pub fn parameters(&self, group: &ParameterGroup) -> ProjectionParameters {
		let mut parameters = ProjectionParameters::from(&self.cfg.defaults);

		if let Some(min_dist) = group.get("min_dist").and_then(Value::as_f64) {
			parameters.min_dist = min_dist;
		}
		if let Some(n_epochs) = group.get("n_epochs").and_then(Value::as_u64) {
			parameters.n_epochs = n_epochs as u32;
		}
		if let Some(n_neighbors) = group.get("n_neighbors").and_then(Value::as_u64) {
			parameters.n_neighbors = n_neighbors as u32;
		}
		if let Some(metric) = group.get("metric").and_then(Value::as_str) {
			parameters.metric = metric.to_owned();
		}

		parameters
	}

	/// The neighborhood-based reducer needs at least `n_neighbors + 1` points;
	/// below that every point lands at the origin and no remote call is made.
	pub async fn project(
		&self,
		vectors: &[Vec<f32>],
		parameters: &ProjectionParameters,
	) -> Result<Vec<Vec<f32>>> {
		if vectors.is_empty() {
			return Ok(Vec::new());
		}

		let reduced_dimensions = self.cfg.reduced_dimensions as usize;

		if vectors.len() < parameters.n_neighbors as usize + 1 {
			tracing::warn!(
				points = vectors.len(),
				n_neighbors = parameters.n_neighbors,
				"Too few points for the configured neighbor count, returning zero coordinates."
			);

			return Ok(vec![vec![0.; reduced_dimensions]; vectors.len()]);
		}

		Ok(self.provider.project(&self.api_base, &self.cfg, vectors, parameters).await?)
	}
}
