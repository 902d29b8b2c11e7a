//! Scanning of a single repository: open, enumerate, aggregate, release.
//!
//! Nothing that goes wrong in here escapes as an error; failures become a
//! read error flag on the returned result.

use super::aggregator::SnapshotAggregator;
use super::run::RepositoryResult;
use crate::reader::{OpenRepository, RepositoryReader, SnapshotSource};
use crate::repos::RepositoryConfig;
use crate::utils::ReaderError;
use futures_util::{FutureExt, StreamExt};
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

async fn drain(source: &mut dyn SnapshotSource) -> Result<SnapshotAggregator, ReaderError> {
    let mut aggregator = SnapshotAggregator::new();
    let mut snapshots = source.snapshots();
    while let Some(summary) = snapshots.next().await {
        let summary = summary?;
        aggregator.add(&summary.owner, &summary.host, summary.time);
    }
    Ok(aggregator)
}

/// Scan one repository.
///
/// Once `open` succeeds the lock is released exactly once before this
/// returns, including when enumeration fails, is cancelled, or panics.
pub async fn scan_repository(
    reader: &dyn RepositoryReader,
    repo: &RepositoryConfig,
    cancel: &CancellationToken,
) -> RepositoryResult {
    let started = Instant::now();
    debug!(repo = %repo.url, "Collecting repository");

    let opened = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ReaderError::Cancelled),
        opened = reader.open(repo) => opened,
    };

    let OpenRepository {
        mut snapshots,
        lock,
    } = match opened {
        Ok(opened) => opened,
        Err(e) => {
            error!(repo = %repo.url, error = %e, "Error opening repository");
            return RepositoryResult::failed(&repo.url);
        }
    };

    let listing = AssertUnwindSafe(async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ReaderError::Cancelled),
            drained = drain(snapshots.as_mut()) => drained,
        }
    })
    .catch_unwind()
    .await;
    drop(snapshots);

    if let Err(e) = lock.release().await {
        warn!(repo = %repo.url, error = %e, "Error releasing repository lock");
    }

    match listing {
        Ok(Ok(aggregator)) => {
            debug!(
                repo = %repo.url,
                sets = aggregator.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Finished collecting repository"
            );
            RepositoryResult::success(&repo.url, aggregator.into_sets())
        }
        Ok(Err(e)) => {
            error!(repo = %repo.url, error = %e, "Error iterating snapshots");
            RepositoryResult::failed(&repo.url)
        }
        Err(_) => {
            error!(repo = %repo.url, "Snapshot enumeration panicked");
            RepositoryResult::failed(&repo.url)
        }
    }
}
