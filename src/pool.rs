//! Bounded, fail-fast task groups.

use crate::error::MirrorError;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::error;

/// Runs one task per item with at most `limit` running at once.
///
/// A task is only spawned once a permit is free, so items start in iteration
/// order. Results are returned in completion order. The first error stops
/// spawning new tasks and cancels the ones in flight; the error is returned
/// only after every cancelled task has been dropped, so their connections
/// and file handles are already released.
pub(crate) async fn try_join_bounded<I, T, F, Fut>(
    limit: usize,
    items: I,
    task: F,
) -> Result<Vec<T>, MirrorError>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T, MirrorError>> + Send + 'static,
    T: Send + 'static,
{
    let mut tasks = JoinSet::new();
    let result = spawn_and_join(&mut tasks, limit, items, task).await;
    if result.is_err() {
        tasks.shutdown().await;
    }
    result
}

async fn spawn_and_join<I, T, F, Fut>(
    tasks: &mut JoinSet<Result<T, MirrorError>>,
    limit: usize,
    items: I,
    task: F,
) -> Result<Vec<T>, MirrorError>
where
    I: IntoIterator,
    F: Fn(I::Item) -> Fut,
    Fut: Future<Output = Result<T, MirrorError>> + Send + 'static,
    T: Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut results = Vec::new();

    for item in items {
        let permit = loop {
            let joined = tokio::select! {
                biased;
                Some(joined) = tasks.join_next() => joined,
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    break permit.map_err(|e| MirrorError::TaskFailed(e.to_string()))?;
                }
            };
            results.push(settle(joined)?);
        };

        let fut = task(item);
        tasks.spawn(async move {
            let _permit = permit;
            fut.await
        });
    }

    while let Some(joined) = tasks.join_next().await {
        results.push(settle(joined)?);
    }
    Ok(results)
}

fn settle<T>(joined: Result<Result<T, MirrorError>, JoinError>) -> Result<T, MirrorError> {
    match joined {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            error!("Task failed: {}", e);
            Err(e)
        }
        Err(e) => {
            error!("Task join error: {}", e);
            Err(MirrorError::TaskFailed(e.to_string()))
        }
    }
}
