//! Keyed worker pool used to parallelise Git operations.
//!
//! Operations that share a key (a remote URL for fetches, an alias name for worktree
//! creation) execute one at a time; operations with different keys run concurrently, up
//! to a bounded pool size. Results are collected fallibly: one item failing doesn't stop
//! the others from completing, but the first error (in key order) is the one the caller
//! ultimately sees.

use std::{collections::HashMap, sync::Arc};

use futures::{stream, StreamExt};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::Result;

/// Default bound on concurrently executing work items, independent of how many share a
/// key.
pub const DEFAULT_CONCURRENCY: usize = 8;

/// Run `items` through `work`, serialising items that share a key (via `key_fn`) onto
/// the same internal lock, while letting differently-keyed items run in parallel up to
/// `concurrency`.
///
/// Returns one [`Result`] per input item, in the same order as `items`. A failing item
/// does not cancel the others.
pub async fn run_keyed<T, K, F, Fut>(items: Vec<T>, key_fn: K, concurrency: usize, work: F) -> Vec<Result<()>>
where
    T: Send + 'static,
    K: Fn(&T) -> String,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<()>> + Send,
{
    let work = Arc::new(work);
    let mut locks: HashMap<String, Arc<AsyncMutex<()>>> = HashMap::new();
    let keyed_items: Vec<(Arc<AsyncMutex<()>>, T)> = items
        .into_iter()
        .map(|item| {
            let key = key_fn(&item);
            let lock = locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();
            (lock, item)
        })
        .collect();

    let results = Arc::new(AsyncMutex::new(Vec::with_capacity(keyed_items.len())));
    let bound = concurrency.max(1);

    stream::iter(keyed_items.into_iter().enumerate())
        .for_each_concurrent(bound, |(index, (lock, item))| {
            let work = Arc::clone(&work);
            let results = Arc::clone(&results);
            async move {
                let _guard = lock.lock().await;
                let outcome = work(item).await;
                let mut results = results.lock().await;
                if results.len() <= index {
                    results.resize_with(index + 1, || None);
                }
                results[index] = Some(outcome);
            }
        })
        .await;

    // Every clone of `results` was held only inside a now-completed future, so this is
    // the sole remaining reference.
    let results = Arc::try_unwrap(results).expect("all work items completed before this point").into_inner();
    results
        .into_iter()
        .map(|r| r.unwrap_or_else(|| Err(crate::error::Error::Evaluation("work item did not complete".into()))))
        .collect()
}
