use std::{
	collections::HashMap,
	fs,
	path::PathBuf,
	sync::RwLock,
};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::OffsetDateTime;

use crate::{Error, Result, embedding_cache::write_atomically};

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct KvEntry {
	pub stored_at: OffsetDateTime,
	pub expires_at: OffsetDateTime,
	pub value: Value,
}

/// Key/value store with TTL expiry. Expired entries are treated as absent on
/// read and evicted lazily; there is no background sweep.
pub trait KvStore
where
	Self: Send + Sync,
{
	fn get(&self, key: &str, now: OffsetDateTime) -> Result<Option<Value>>;
	fn set(&self, key: &str, value: Value, stored_at: OffsetDateTime, expires_at: OffsetDateTime)
	-> Result<()>;
	fn clear(&self) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryKv {
	entries: RwLock<HashMap<String, KvEntry>>,
}

/// One JSON file per key under `dir`. Keys are expected to be hex digests, so
/// they are filename-safe by construction.
pub struct DiskKv {
	dir: PathBuf,
}

impl MemoryKv {
	pub fn new() -> Self {
		Self::default()
	}
}

impl KvStore for MemoryKv {
	fn get(&self, key: &str, now: OffsetDateTime) -> Result<Option<Value>> {
		let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());

		match entries.get(key) {
			Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
			Some(_) => {
				entries.remove(key);

				Ok(None)
			},
			None => Ok(None),
		}
	}

	fn set(
		&self,
		key: &str,
		value: Value,
		stored_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<()> {
		self.entries
			.write()
			.unwrap_or_else(|poisoned| poisoned.into_inner())
			.insert(key.to_string(), KvEntry { stored_at, expires_at, value });

		Ok(())
	}

	fn clear(&self) -> Result<()> {
		self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();

		Ok(())
	}
}

impl DiskKv {
	pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
		let dir = dir.into();

		fs::create_dir_all(&dir).map_err(|err| Error::Write { path: dir.clone(), source: err })?;

		Ok(Self { dir })
	}

	fn entry_path(&self, key: &str) -> PathBuf {
		self.dir.join(format!("{key}.json"))
	}
}

impl KvStore for DiskKv {
	fn get(&self, key: &str, now: OffsetDateTime) -> Result<Option<Value>> {
		let path = self.entry_path(key);

		if !path.exists() {
			return Ok(None);
		}

		let raw =
			fs::read_to_string(&path).map_err(|err| Error::Read { path: path.clone(), source: err })?;
		let entry: KvEntry = serde_json::from_str(&raw)
			.map_err(|err| Error::Decode { path: path.clone(), source: err })?;

		if entry.expires_at <= now {
			if let Err(err) = fs::remove_file(&path) {
				tracing::warn!(error = %err, path = %path.display(), "Failed to evict expired cache entry.");
			}

			return Ok(None);
		}

		Ok(Some(entry.value))
	}

	fn set(
		&self,
		key: &str,
		value: Value,
		stored_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<()> {
		let entry = KvEntry { stored_at, expires_at, value };
		let encoded = serde_json::to_vec(&entry).map_err(Error::Encode)?;

		write_atomically(&self.entry_path(key), &encoded)
	}

	fn clear(&self) -> Result<()> {
		for file in
			fs::read_dir(&self.dir).map_err(|err| Error::Read { path: self.dir.clone(), source: err })?
		{
			let file = file.map_err(|err| Error::Read { path: self.dir.clone(), source: err })?;
			let path = file.path();

			if path.extension().and_then(|ext| ext.to_str()) == Some("json") {
				fs::remove_file(&path)
					.map_err(|err| Error::Write { path: path.clone(), source: err })?;
			}
		}

		Ok(())
	}
}
