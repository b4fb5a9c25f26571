pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Failed to read cache data at {path:?}.")]
	Read { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to write cache data at {path:?}.")]
	Write { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to decode cache payload at {path:?}.")]
	Decode { path: std::path::PathBuf, source: serde_json::Error },
	#[error("Failed to encode cache payload: {0}")]
	Encode(#[source] serde_json::Error),
}
