pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Chunk window of {window_chars} chars with {overlap_chars} chars overlap has a non-positive step.")]
	InvalidWindow { window_chars: u32, overlap_chars: u32 },
}

#[derive(Clone, Debug)]
pub struct ChunkingConfig {
	pub window_chars: u32,
	pub overlap_chars: u32,
}

/// One text field of a source item, possibly holding several values (e.g. pages).
#[derive(Clone, Debug)]
pub enum SourceField {
	Single(String),
	Multiple(Vec<String>),
}

/// Splits `text` into windows of at most `window_chars` characters starting at
/// offsets `0, step, 2 * step, ...` where `step = window_chars - overlap_chars`.
///
/// Offsets are character offsets, so multi-byte text never splits inside a
/// code point. Deterministic, no I/O.
pub fn chunk_text(text: &str, cfg: &ChunkingConfig) -> Result<Vec<String>> {
	if cfg.window_chars == 0 || cfg.overlap_chars >= cfg.window_chars {
		return Err(Error::InvalidWindow {
			window_chars: cfg.window_chars,
			overlap_chars: cfg.overlap_chars,
		});
	}

	let window = cfg.window_chars as usize;
	let step = (cfg.window_chars - cfg.overlap_chars) as usize;
	let chars: Vec<char> = text.chars().collect();
	let mut chunks = Vec::new();
	let mut start = 0_usize;

	while start < chars.len() {
		let end = (start + window).min(chars.len());

		chunks.push(chars[start..end].iter().collect());

		start += step;
	}

	Ok(chunks)
}

/// Applies [`chunk_text`] across a batch of source fields, preserving input
/// order. Each field contributes one chunk list per contained text.
pub fn chunk_source_fields(
	fields: &[SourceField],
	cfg: &ChunkingConfig,
) -> Result<Vec<Vec<String>>> {
	let mut result = Vec::new();

	for field in fields {
		match field {
			SourceField::Single(text) => result.push(chunk_text(text, cfg)?),
			SourceField::Multiple(texts) =>
				for text in texts {
					result.push(chunk_text(text, cfg)?);
				},
		}
	}

	Ok(result)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_into_overlapping_windows() {
		let cfg = ChunkingConfig { window_chars: 10, overlap_chars: 3 };
		let text = "abcdefghijklmnopqrstuvwxy";
		let chunks = chunk_text(text, &cfg).unwrap();

		// 25 chars with step 7 gives ceil(25 / 7) window starts.
		assert_eq!(chunks.len(), 4);
		assert_eq!(chunks[0], "abcdefghij");
		assert_eq!(chunks[1], "hijklmnopq");
		assert_eq!(chunks[2], "opqrstuvwx");
		assert_eq!(chunks[3], "vwxy");
		assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 10));
	}

	#[test]
	fn chunks_cover_the_full_text_without_gaps() {
		let cfg = ChunkingConfig { window_chars: 10, overlap_chars: 3 };
		let text = "abcdefghijklmnopqrstuvwxy";
		let chunks = chunk_text(text, &cfg).unwrap();
		let step = 7;
		let mut reconstructed = String::new();

		for (i, chunk) in chunks.iter().enumerate() {
			if i == 0 {
				reconstructed.push_str(chunk);
			} else {
				let covered = reconstructed.chars().count() - i * step;
				reconstructed.extend(chunk.chars().skip(covered));
			}
		}

		assert_eq!(reconstructed, text);
	}

	#[test]
	fn rejects_non_positive_step() {
		let cfg = ChunkingConfig { window_chars: 5, overlap_chars: 5 };

		assert!(matches!(chunk_text("abc", &cfg), Err(Error::InvalidWindow { .. })));

		let cfg = ChunkingConfig { window_chars: 5, overlap_chars: 9 };

		assert!(chunk_text("abc", &cfg).is_err());

		let cfg = ChunkingConfig { window_chars: 0, overlap_chars: 0 };

		assert!(chunk_text("abc", &cfg).is_err());
	}

	#[test]
	fn short_text_yields_single_chunk() {
		let cfg = ChunkingConfig { window_chars: 100, overlap_chars: 10 };
		let chunks = chunk_text("short", &cfg).unwrap();

		assert_eq!(chunks, vec!["short".to_string()]);
	}

	#[test]
	fn empty_text_yields_no_chunks() {
		let cfg = ChunkingConfig { window_chars: 10, overlap_chars: 3 };

		assert!(chunk_text("", &cfg).unwrap().is_empty());
	}

	#[test]
	fn respects_char_boundaries_in_multibyte_text() {
		let cfg = ChunkingConfig { window_chars: 4, overlap_chars: 1 };
		let chunks = chunk_text("aあbいcうdえe", &cfg).unwrap();

		assert_eq!(chunks[0], "aあbい");
		assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 4));
	}

	#[test]
	fn batches_preserve_field_order() {
		let cfg = ChunkingConfig { window_chars: 4, overlap_chars: 1 };
		let fields = vec![
			SourceField::Single("abcdef".to_string()),
			SourceField::Multiple(vec!["page one".to_string(), "page two".to_string()]),
			SourceField::Single("xyz".to_string()),
		];
		let chunked = chunk_source_fields(&fields, &cfg).unwrap();

		assert_eq!(chunked.len(), 4);
		assert_eq!(chunked[0][0], "abcd");
		assert!(chunked[1][0].starts_with("page"));
		assert_eq!(chunked[3], vec!["xyz".to_string()]);
	}
}
