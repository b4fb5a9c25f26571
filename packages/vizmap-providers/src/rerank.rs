// crates.io
use color_eyre::{Result, eyre};
use serde_json::Value;

/// One row of a reranking response, referencing a position in the submitted
/// document list. Rows arrive ordered by descending relevance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RerankResult {
	pub index: usize,
	pub relevance_score: f32,
}

pub async fn rerank(
	cfg: &vizmap_config::ProviderConfig,
	query: &str,
	docs: &[String],
	top_n: usize,
) -> Result<Vec<RerankResult>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"query": query,
		"documents": docs,
		"top_n": top_n,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<RerankResult>> {
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Rerank response is missing results array."))?;

	let mut rows = Vec::with_capacity(results.len());
	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| eyre::eyre!("Rerank result missing index."))? as usize;
		let relevance_score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| eyre::eyre!("Rerank result missing score."))? as f32;
		if index >= doc_count {
			return Err(eyre::eyre!("Rerank result index {index} is out of range."));
		}
		rows.push(RerankResult { index, relevance_score });
	}

	Ok(rows)
}
