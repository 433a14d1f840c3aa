//! Settled fan-out over a batch of items.

use std::fmt::Display;
use std::future::Future;

use futures_util::future::join_all;
use tracing::debug;

/// Runs `f` for every item concurrently and waits for all of them to settle.
///
/// The result has one entry per item, in input order. A failure for one item
/// never affects the others.
pub async fn run_in_parallel<I, F, Fut, T, E>(items: I, f: F) -> Vec<Result<T, E>>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let results = join_all(items.into_iter().map(f)).await;
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        debug!(error = %err, "parallel task failed");
    }
    results
}
