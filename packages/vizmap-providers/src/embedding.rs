use color_eyre::{Result, eyre};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingRow>,
}

/// Backends are not required to echo the submitted order; the optional
/// `index` field pins each row back to its input position.
#[derive(Debug, Deserialize)]
struct EmbeddingRow {
	#[serde(default)]
	index: Option<usize>,
	embedding: Vec<f32>,
}

pub async fn embed(
	cfg: &vizmap_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
		"strategy": cfg.strategy,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let response = res.error_for_status()?.json::<EmbeddingResponse>().await?;

	into_ordered_vectors(response, texts.len())
}

fn into_ordered_vectors(response: EmbeddingResponse, expected_rows: usize) -> Result<Vec<Vec<f32>>> {
	if response.data.len() != expected_rows {
		return Err(eyre::eyre!(
			"Embedding response has {} rows, expected {expected_rows}.",
			response.data.len()
		));
	}

	let mut indexed = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, row)| (row.index.unwrap_or(position), row.embedding))
		.collect::<Vec<_>>();

	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, embedding)| embedding).collect())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(json: serde_json::Value) -> EmbeddingResponse {
		serde_json::from_value(json).expect("decode failed")
	}

	#[test]
	fn restores_input_order_from_row_indices() {
		let response = response(serde_json::json!({
			"data": [
				{ "index": 1, "embedding": [2.0, 3.0] },
				{ "index": 0, "embedding": [0.5, 1.5] }
			]
		}));
		let vectors = into_ordered_vectors(response, 2).expect("parse failed");

		assert_eq!(vectors, vec![vec![0.5, 1.5], vec![2.0, 3.0]]);
	}

	#[test]
	fn falls_back_to_arrival_order_without_indices() {
		let response = response(serde_json::json!({
			"data": [
				{ "embedding": [1.0] },
				{ "embedding": [2.0] }
			]
		}));
		let vectors = into_ordered_vectors(response, 2).expect("parse failed");

		assert_eq!(vectors, vec![vec![1.0], vec![2.0]]);
	}

	#[test]
	fn rejects_row_count_mismatch() {
		let response = response(serde_json::json!({
			"data": [
				{ "index": 0, "embedding": [1.0] }
			]
		}));

		assert!(into_ordered_vectors(response, 2).is_err());
	}

	#[test]
	fn rejects_response_without_data() {
		assert!(
			serde_json::from_value::<EmbeddingResponse>(serde_json::json!({
				"embeddings": [[1.0]]
			}))
			.is_err()
		);
	}
}
