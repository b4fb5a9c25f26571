mod error;

pub mod embedding_cache;
pub mod kv;

pub use error::{Error, Result};
