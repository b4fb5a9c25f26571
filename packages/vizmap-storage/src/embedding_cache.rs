use std::{
	collections::HashMap,
	fs,
	path::{Path, PathBuf},
	sync::RwLock,
};

use crate::{Error, Result};

/// Namespace -> item id -> vector. A namespace identifies one
/// `(model, strategy)` pair.
pub type EmbeddingSnapshot = HashMap<String, HashMap<String, Vec<f32>>>;

/// Durable backend for the embedding cache. The in-memory structure is
/// authoritative between flushes; the backend only loads at startup and
/// persists on demand.
pub trait EmbeddingStore
where
	Self: Send + Sync,
{
	fn load(&self) -> Result<EmbeddingSnapshot>;
	fn persist(&self, snapshot: &EmbeddingSnapshot) -> Result<()>;
}

/// Flat-file JSON backend. The whole cache is one document, loaded at startup
/// when present and rewritten atomically on flush.
pub struct FileStore {
	path: PathBuf,
}

/// Backend that never persists, for tests and cache-less deployments.
pub struct NullStore;

pub struct EmbeddingCache {
	namespaces: RwLock<EmbeddingSnapshot>,
	store: Box<dyn EmbeddingStore>,
}

impl FileStore {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}
}

impl EmbeddingStore for FileStore {
	fn load(&self) -> Result<EmbeddingSnapshot> {
		if !self.path.exists() {
			return Ok(EmbeddingSnapshot::new());
		}

		let raw = fs::read_to_string(&self.path)
			.map_err(|err| Error::Read { path: self.path.clone(), source: err })?;

		serde_json::from_str(&raw)
			.map_err(|err| Error::Decode { path: self.path.clone(), source: err })
	}

	fn persist(&self, snapshot: &EmbeddingSnapshot) -> Result<()> {
		let encoded = serde_json::to_vec(snapshot).map_err(Error::Encode)?;

		write_atomically(&self.path, &encoded)
	}
}

impl EmbeddingStore for NullStore {
	fn load(&self) -> Result<EmbeddingSnapshot> {
		Ok(EmbeddingSnapshot::new())
	}

	fn persist(&self, _snapshot: &EmbeddingSnapshot) -> Result<()> {
		Ok(())
	}
}

impl EmbeddingCache {
	/// Loads whatever the backend has; a missing file starts empty.
	pub fn open(store: Box<dyn EmbeddingStore>) -> Result<Self> {
		let namespaces = store.load()?;

		if !namespaces.is_empty() {
			tracing::info!(
				namespaces = namespaces.len(),
				entries = namespaces.values().map(HashMap::len).sum::<usize>(),
				"Loaded embedding cache."
			);
		}

		Ok(Self { namespaces: RwLock::new(namespaces), store })
	}

	pub fn in_memory() -> Self {
		Self { namespaces: RwLock::new(EmbeddingSnapshot::new()), store: Box::new(NullStore) }
	}

	pub fn namespace(model: &str, strategy: &str) -> String {
		format!("{model}:{strategy}")
	}

	pub fn get(&self, namespace: &str, item_id: &str) -> Option<Vec<f32>> {
		let namespaces = self.namespaces.read().unwrap_or_else(|poisoned| poisoned.into_inner());

		namespaces.get(namespace).and_then(|entries| entries.get(item_id)).cloned()
	}

	/// Append-or-overwrite by key. Same-key writers race last-write-wins,
	/// which is safe because recomputation is idempotent per input text.
	pub fn put(&self, namespace: &str, item_id: String, vector: Vec<f32>) {
		let mut namespaces =
			self.namespaces.write().unwrap_or_else(|poisoned| poisoned.into_inner());

		namespaces.entry(namespace.to_string()).or_default().insert(item_id, vector);
	}

	pub fn entry_count(&self, namespace: &str) -> usize {
		let namespaces = self.namespaces.read().unwrap_or_else(|poisoned| poisoned.into_inner());

		namespaces.get(namespace).map(HashMap::len).unwrap_or(0)
	}

	/// Persists a consistent snapshot. Entries written after the snapshot was
	/// taken wait for the next flush.
	pub fn flush(&self) -> Result<()> {
		let snapshot =
			self.namespaces.read().unwrap_or_else(|poisoned| poisoned.into_inner()).clone();

		self.store.persist(&snapshot)
	}

	/// Manual eviction; entries never expire on their own.
	pub fn clear(&self) {
		self.namespaces.write().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
	}
}

pub(crate) fn write_atomically(path: &Path, payload: &[u8]) -> Result<()> {
	if let Some(parent) = path.parent()
		&& !parent.as_os_str().is_empty()
	{
		fs::create_dir_all(parent)
			.map_err(|err| Error::Write { path: path.to_path_buf(), source: err })?;
	}

	let tmp = path.with_extension("tmp");

	fs::write(&tmp, payload).map_err(|err| Error::Write { path: tmp.clone(), source: err })?;
	fs::rename(&tmp, path).map_err(|err| Error::Write { path: path.to_path_buf(), source: err })?;

	Ok(())
}
