//! Built-in search collaborator. The retrieval backend proper lives outside
//! this binary; requests carry their candidate items inline in the `search`
//! parameter group, already ranked. Because the items are part of that group,
//! a different corpus automatically yields a different search stage hash.

use serde::Deserialize;
use vizmap_pipeline::{BoxFuture, ItemKey, MapItem, ParameterGroup, SearchProvider, SearchResults};

#[derive(Debug, Deserialize)]
struct InlineItem {
	dataset_id: i32,
	item_id: String,
	text: String,
}

/// Serves `search.items` as the ranked result set, best-first, order kept.
pub struct InlineSearch;

impl SearchProvider for InlineSearch {
	fn search<'a>(
		&'a self,
		params: &'a ParameterGroup,
	) -> BoxFuture<'a, color_eyre::Result<SearchResults>> {
		Box::pin(async move {
			let raw = params
				.get("items")
				.cloned()
				.ok_or_else(|| color_eyre::eyre::eyre!("The search group must contain `items`."))?;
			let inline = serde_json::from_value::<Vec<InlineItem>>(raw)
				.map_err(|error| color_eyre::eyre::eyre!("Invalid `search.items`: {error}."))?;
			let items = inline
				.into_iter()
				.map(|item| {
					MapItem::new(
						ItemKey { dataset_id: item.dataset_id, item_id: item.item_id },
						item.text,
					)
				})
				.collect();

			Ok(SearchResults::from_ranked(items))
		})
	}
}
