pub mod embedding;
pub mod map_store;
pub mod params;
pub mod projection;
pub mod rerank;
pub mod run;
pub mod stage;

use std::{future::Future, pin::Pin, sync::Arc};

pub use map_store::{MapArtifact, MapStore};
pub use params::{ItemKey, MapItem, ParameterGroup, PipelineParameters, ProvenanceEntry};
pub use projection::ProjectionService;
pub use rerank::RerankOutcome;

use vizmap_config::{Config, EmbeddingProviderConfig, ProjectionProviderConfig, ProviderConfig};
use vizmap_providers::{
	embedding as embedding_provider, projection as projection_provider,
	projection::ProjectionParameters, rerank as rerank_provider, rerank::RerankResult,
};
use vizmap_storage::{
	embedding_cache::{EmbeddingCache, FileStore},
	kv::{DiskKv, KvStore, MemoryKv},
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub enum Error {
	Config { message: String },
	InvalidRequest { message: String },
	Provider { message: String },
	Storage { message: String },
}

/// Ranked result of the external search collaborator: item keys best-first,
/// plus the item payloads they reference.
#[derive(Clone, Debug, Default)]
pub struct SearchResults {
	pub sorted_ids: Vec<ItemKey>,
	pub items: std::collections::HashMap<ItemKey, MapItem>,
}

impl SearchResults {
	/// Wraps an already ranked item list, best-first.
	pub fn from_ranked(items: Vec<MapItem>) -> Self {
		Self {
			sorted_ids: items.iter().map(|item| item.key.clone()).collect(),
			items: items.into_iter().map(|item| (item.key.clone(), item)).collect(),
		}
	}
}

/// The actual retrieval logic lives outside this crate; the pipeline only
/// forwards the opaque `search` parameter group and consumes the ranking.
pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		params: &'a ParameterGroup,
	) -> BoxFuture<'a, color_eyre::Result<SearchResults>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RerankResult>>>;
}

pub trait ProjectionProvider
where
	Self: Send + Sync,
{
	fn project<'a>(
		&'a self,
		api_base: &'a str,
		cfg: &'a ProjectionProviderConfig,
		vectors: &'a [Vec<f32>],
		parameters: &'a ProjectionParameters,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>>;

	fn probe_health<'a>(
		&'a self,
		api_base: &'a str,
		cfg: &'a ProjectionProviderConfig,
	) -> BoxFuture<'a, color_eyre::Result<()>>;
}

#[derive(Clone)]
pub struct Providers {
	pub search: Arc<dyn SearchProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub projection: Arc<dyn ProjectionProvider>,
}

pub struct MapPipeline {
	pub cfg: Config,
	pub providers: Providers,
	pub(crate) embedding_cache: EmbeddingCache,
	pub(crate) rerank_cache: Box<dyn KvStore>,
	pub(crate) map_store: MapStore,
	pub(crate) projection: ProjectionService,
}

struct DefaultProviders;

impl std::fmt::Display for Error {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Config { message } => write!(f, "Config error: {message}"),
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
		}
	}
}

impl std::error::Error for Error {}

impl From<color_eyre::Report> for Error {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<vizmap_storage::Error> for Error {
	fn from(err: vizmap_storage::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<vizmap_chunking::Error> for Error {
	fn from(err: vizmap_chunking::Error) -> Self {
		Self::Config { message: err.to_string() }
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding_provider::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, color_eyre::Result<Vec<RerankResult>>> {
		Box::pin(rerank_provider::rerank(cfg, query, docs, top_n))
	}
}

impl ProjectionProvider for DefaultProviders {
	fn project<'a>(
		&'a self,
		api_base: &'a str,
		cfg: &'a ProjectionProviderConfig,
		vectors: &'a [Vec<f32>],
		parameters: &'a ProjectionParameters,
	) -> BoxFuture<'a, color_eyre::Result<Vec<Vec<f32>>>> {
		Box::pin(projection_provider::project(api_base, cfg, vectors, parameters))
	}

	fn probe_health<'a>(
		&'a self,
		api_base: &'a str,
		cfg: &'a ProjectionProviderConfig,
	) -> BoxFuture<'a, color_eyre::Result<()>> {
		Box::pin(projection_provider::probe_health(api_base, cfg))
	}
}

impl Providers {
	pub fn new(
		search: Arc<dyn SearchProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		projection: Arc<dyn ProjectionProvider>,
	) -> Self {
		Self { search, embedding, rerank, projection }
	}

	/// Remote providers straight from `vizmap-providers`; only the search
	/// collaborator has to be supplied.
	pub fn with_default_remotes(search: Arc<dyn SearchProvider>) -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { search, embedding: provider.clone(), rerank: provider.clone(), projection: provider }
	}
}

impl MapPipeline {
	pub async fn new(cfg: Config, search: Arc<dyn SearchProvider>) -> Result<Self> {
		Self::with_providers(cfg, Providers::with_default_remotes(search)).await
	}

	/// Construction selects the projection backend once; everything afterwards
	/// is stateless per request.
	pub async fn with_providers(cfg: Config, providers: Providers) -> Result<Self> {
		let embedding_cache = match cfg.cache.embedding_cache_path.as_deref() {
			Some(path) => EmbeddingCache::open(Box::new(FileStore::new(path)))?,
			None => EmbeddingCache::in_memory(),
		};
		let rerank_cache: Box<dyn KvStore> = match cfg.cache.rerank_cache_dir.as_deref() {
			Some(dir) => Box::new(DiskKv::new(dir)?),
			None => Box::new(MemoryKv::new()),
		};
		let projection =
			ProjectionService::select(cfg.providers.projection.clone(), providers.projection.clone())
				.await;

		Ok(Self {
			cfg,
			providers,
			embedding_cache,
			rerank_cache,
			map_store: MapStore::new(),
			projection,
		})
	}

	pub fn map_store(&self) -> &MapStore {
		&self.map_store
	}

	/// Persists the embedding cache now. Writes since process start that have
	/// not been flushed are lost on crash, which is acceptable because
	/// recomputation is idempotent.
	pub fn flush_embedding_cache(&self) -> Result<()> {
		Ok(self.embedding_cache.flush()?)
	}

	pub(crate) fn embedding_namespace(&self) -> String {
		EmbeddingCache::namespace(
			&self.cfg.providers.embedding.model,
			&self.cfg.providers.embedding.strategy,
		)
	}
}
