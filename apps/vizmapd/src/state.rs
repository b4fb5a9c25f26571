use std::sync::Arc;

use vizmap_pipeline::MapPipeline;

use crate::search::InlineSearch;

#[derive(Clone)]
pub struct AppState {
	pub pipeline: Arc<MapPipeline>,
}

impl AppState {
	pub async fn new(config: vizmap_config::Config) -> color_eyre::Result<Self> {
		let pipeline = MapPipeline::new(config, Arc::new(InlineSearch)).await?;

		Ok(Self { pipeline: Arc::new(pipeline) })
	}
}
