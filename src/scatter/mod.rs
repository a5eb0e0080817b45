//! Scatter-gather — run one operation per physical connection concurrently.
//!
//! Lifecycle operations on [`DB`](crate::router::DB) (open, close, ping) are
//! applied to every physical connection at once. The helpers here start one
//! future per slot, wait for *all* of them to finish, and then aggregate.
//!
//! There is no early cancellation: when one slot fails, the others still run
//! to completion. There is no timeout either; a slot that never resolves
//! stalls the whole call.

use std::future::Future;

use futures::future::join_all;
use tracing::debug;

/// Runs `work(i)` for every `i` in `0..count` concurrently and returns every
/// outcome in slot order.
///
/// `work` is called exactly once per index, before any of the returned
/// futures is polled. The call resolves only after every future has
/// completed.
///
/// # Examples
///
/// ```
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use splitdb::scatter::scatter_all;
///
/// let results = scatter_all(3, |i| async move {
///     if i == 1 { Err("boom") } else { Ok(i * 10) }
/// })
/// .await;
///
/// assert_eq!(results, vec![Ok(0), Err("boom"), Ok(20)]);
/// # }
/// ```
pub async fn scatter_all<F, Fut, T, E>(count: usize, work: F) -> Vec<Result<T, E>>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if count == 0 {
        return Vec::new();
    }

    let results = join_all((0..count).map(work)).await;

    debug!(
        slots = count,
        failed = results.iter().filter(|r| r.is_err()).count(),
        "scatter-gather complete"
    );

    results
}

/// Runs `work(i)` for every `i` in `0..count` concurrently and aggregates the
/// outcome.
///
/// Returns every value in slot order when all slots succeed. When one or more
/// slots fail, the error of the lowest failing index is returned; the other
/// errors are dropped.
///
/// `count == 0` resolves to `Ok(vec![])` without calling `work`.
pub async fn scatter<F, Fut, T, E>(count: usize, work: F) -> Result<Vec<T>, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    scatter_all(count, work).await.into_iter().collect()
}
