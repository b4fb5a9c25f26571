use color_eyre::{Result, eyre};
use serde_json::Value;

/// Hyperparameters forwarded to the remote reducer. The backend applies a
/// fixed random seed, so identical vectors and parameters reproduce identical
/// coordinates.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct ProjectionParameters {
	pub min_dist: f64,
	pub n_epochs: u32,
	pub n_neighbors: u32,
	pub metric: String,
}

impl From<&vizmap_config::ProjectionDefaults> for ProjectionParameters {
	fn from(defaults: &vizmap_config::ProjectionDefaults) -> Self {
		Self {
			min_dist: defaults.min_dist,
			n_epochs: defaults.n_epochs,
			n_neighbors: defaults.n_neighbors,
			metric: defaults.metric.clone(),
		}
	}
}

pub async fn project(
	api_base: &str,
	cfg: &vizmap_config::ProjectionProviderConfig,
	vectors: &[Vec<f32>],
	parameters: &ProjectionParameters,
) -> Result<Vec<Vec<f32>>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", api_base, cfg.path);
	let body = serde_json::json!({
		"vectors": vectors,
		"reduced_dimensions": cfg.reduced_dimensions,
		"projection_parameters": parameters,
	});
	let res = client.post(url).json(&body).send().await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_projection_response(json, vectors.len(), cfg.reduced_dimensions as usize)
}

/// One-shot reachability probe of a reducer endpoint, used to pick the GPU
/// path at startup.
pub async fn probe_health(
	api_base: &str,
	cfg: &vizmap_config::ProjectionProviderConfig,
) -> Result<()> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", api_base, cfg.health_path);

	client.get(url).send().await?.error_for_status()?;

	Ok(())
}

fn parse_projection_response(
	json: Value,
	row_count: usize,
	dimensions: usize,
) -> Result<Vec<Vec<f32>>> {
	let projections = json
		.get("projections")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Projection response is missing projections array."))?;

	if projections.len() != row_count {
		return Err(eyre::eyre!(
			"Projection response has {} rows, expected {row_count}.",
			projections.len()
		));
	}

	let mut rows = Vec::with_capacity(projections.len());
	for row in projections {
		let coords = row
			.as_array()
			.ok_or_else(|| eyre::eyre!("Projection row must be a coordinate array."))?;
		if coords.len() != dimensions {
			return Err(eyre::eyre!(
				"Projection row has {} coordinates, expected {dimensions}.",
				coords.len()
			));
		}
		let mut vec = Vec::with_capacity(coords.len());
		for value in coords {
			let number =
				value.as_f64().ok_or_else(|| eyre::eyre!("Coordinate value must be numeric."))?;
			vec.push(number as f32);
		}
		rows.push(vec);
	}

	Ok(rows)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_coordinate_rows() {
		let json = serde_json::json!({
			"projections": [[0.1, 0.2], [0.3, 0.4]]
		});
		let rows = parse_projection_response(json, 2, 2).expect("parse failed");
		assert_eq!(rows, vec![vec![0.1, 0.2], vec![0.3, 0.4]]);
	}

	#[test]
	fn rejects_row_count_mismatch() {
		let json = serde_json::json!({
			"projections": [[0.1, 0.2]]
		});
		assert!(parse_projection_response(json, 2, 2).is_err());
	}

	#[test]
	fn rejects_dimension_mismatch() {
		let json = serde_json::json!({
			"projections": [[0.1, 0.2, 0.3]]
		});
		assert!(parse_projection_response(json, 1, 2).is_err());
	}
}
