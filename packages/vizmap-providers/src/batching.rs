use std::{future::Future, sync::Arc};

use color_eyre::{Result, eyre};
use tokio::{sync::Semaphore, task::JoinSet};

/// Runs `worker` over contiguous chunks of at most `batch_size` items, one
/// chunk at a time, and concatenates the results in input order.
///
/// Fail-fast: the first worker error aborts the whole call. Retry, if any,
/// belongs to the worker implementation. Each worker call must return exactly
/// one result per input item.
pub async fn run_in_batches<T, R, F, Fut>(
	items: Vec<T>,
	batch_size: usize,
	worker: F,
) -> Result<Vec<R>>
where
	F: Fn(Vec<T>) -> Fut,
	Fut: Future<Output = Result<Vec<R>>>,
{
	if batch_size == 0 {
		return Err(eyre::eyre!("Batch size must be greater than zero."));
	}

	let mut results = Vec::with_capacity(items.len());
	let mut iter = items.into_iter();

	loop {
		let batch: Vec<T> = iter.by_ref().take(batch_size).collect();

		if batch.is_empty() {
			break;
		}

		let expected = batch.len();
		let partial = worker(batch).await?;

		if partial.len() != expected {
			return Err(eyre::eyre!(
				"Batch worker returned {} results for {expected} items.",
				partial.len()
			));
		}

		results.extend(partial);
	}

	Ok(results)
}

/// Like [`run_in_batches`], but issues up to `max_concurrent` worker calls at
/// once to bound outstanding requests against one backend. Results still come
/// back in input order.
pub async fn run_in_batches_bounded<T, R, F, Fut>(
	items: Vec<T>,
	batch_size: usize,
	max_concurrent: usize,
	worker: F,
) -> Result<Vec<R>>
where
	T: Send + 'static,
	R: Send + 'static,
	F: Fn(Vec<T>) -> Fut + Clone + Send + 'static,
	Fut: Future<Output = Result<Vec<R>>> + Send + 'static,
{
	if batch_size == 0 {
		return Err(eyre::eyre!("Batch size must be greater than zero."));
	}
	if max_concurrent == 0 {
		return Err(eyre::eyre!("Concurrency bound must be greater than zero."));
	}

	let semaphore = Arc::new(Semaphore::new(max_concurrent));
	let mut set = JoinSet::new();
	let mut iter = items.into_iter();
	let mut batch_count = 0_usize;

	loop {
		let batch: Vec<T> = iter.by_ref().take(batch_size).collect();

		if batch.is_empty() {
			break;
		}

		let index = batch_count;
		let expected = batch.len();
		let semaphore = semaphore.clone();
		let worker = worker.clone();

		set.spawn(async move {
			let permit = semaphore.acquire_owned().await;

			if permit.is_err() {
				return (index, Err(eyre::eyre!("Batch semaphore closed unexpectedly.")));
			}

			let result = worker(batch).await.and_then(|partial| {
				if partial.len() == expected {
					Ok(partial)
				} else {
					Err(eyre::eyre!(
						"Batch worker returned {} results for {expected} items.",
						partial.len()
					))
				}
			});

			(index, result)
		});

		batch_count += 1;
	}

	let mut slots: Vec<Option<Vec<R>>> = std::iter::repeat_with(|| None).take(batch_count).collect();

	while let Some(joined) = set.join_next().await {
		let (index, result) = joined.map_err(|err| eyre::eyre!("Batch task panicked: {err}"))?;

		// Remaining in-flight batches are aborted when the set drops.
		slots[index] = Some(result?);
	}

	let mut results = Vec::new();

	for slot in slots {
		let Some(partial) = slot else {
			return Err(eyre::eyre!("Batch result slot was never filled."));
		};

		results.extend(partial);
	}

	Ok(results)
}
