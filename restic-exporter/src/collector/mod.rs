//! Collection runs across every configured repository.
//!
//! A run snapshots the repository list, scans each enabled repository in
//! its own task, joins all of them and publishes the combined result as a
//! single immutable value. At most one run is in flight; a second request
//! while one is running is dropped, not queued.

pub mod aggregator;
pub mod run;
pub mod task;

#[cfg(test)]
pub(crate) mod testing;

use crate::metrics::MetricsStore;
use crate::reader::RepositoryReader;
use crate::repos::ConfigStore;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

pub use aggregator::{BackupSet, SnapshotAggregator, LEGACY_AGE_DAYS, UNKNOWN_OWNER};
pub use run::{CollectionRun, RepositoryResult};
pub use task::scan_repository;

/// What happened to a request to start a run.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The run completed and its result is now published.
    Published(Arc<CollectionRun>),
    /// Another run was already in flight; this request was dropped.
    Busy,
    /// The collector is shutting down and accepts no new runs.
    Closed,
}

pub struct Collector {
    reader: Arc<dyn RepositoryReader>,
    config: Arc<ConfigStore>,
    metrics: Arc<MetricsStore>,
    /// Held for the whole duration of a run.
    running: Mutex<()>,
    /// Every repository task ever spawned, so shutdown can wait for their
    /// lock releases.
    tasks: TaskTracker,
    io_cancel: CancellationToken,
}

impl Collector {
    pub fn new(
        reader: Arc<dyn RepositoryReader>,
        config: Arc<ConfigStore>,
        metrics: Arc<MetricsStore>,
    ) -> Self {
        Self {
            reader,
            config,
            metrics,
            running: Mutex::new(()),
            tasks: TaskTracker::new(),
            io_cancel: CancellationToken::new(),
        }
    }

    /// Run one collection unless one is already running.
    pub async fn try_run(&self) -> RunOutcome {
        let Ok(_running) = self.running.try_lock() else {
            warn!("Collection already running, dropping request");
            return RunOutcome::Busy;
        };

        if self.tasks.is_closed() {
            warn!("Collector is shutting down, not starting a collection");
            return RunOutcome::Closed;
        }

        let started = Instant::now();
        let repos = self.config.snapshot();

        let mut join_set = JoinSet::new();
        let mut pending = HashMap::new();

        for repo in repos.iter().filter(|repo| !repo.disabled) {
            let reader = self.reader.clone();
            let repo = repo.clone();
            let cancel = self.io_cancel.clone();
            let url = repo.url.clone();

            let handle = join_set.spawn(self.tasks.track_future(async move {
                scan_repository(reader.as_ref(), &repo, &cancel).await
            }));
            pending.insert(handle.id(), url);
        }

        info!(
            repositories = pending.len(),
            disabled = repos.len() - pending.len(),
            "Collection started"
        );

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = join_set.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    debug!(repo = %result.url, failed = result.is_failed(), "Repository reported");
                    results.push(result);
                }
                Err(e) => {
                    let url = pending.remove(&e.id()).unwrap_or_default();
                    error!(repo = %url, error = %e, "Repository task aborted");
                    results.push(RepositoryResult::failed(url));
                }
            }
        }

        let run = Arc::new(CollectionRun::new(Utc::now(), results));
        self.metrics.publish(run.clone());

        info!(
            repositories = run.repositories.len(),
            errors = run.error_count,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Collection finished"
        );
        debug!(
            legacy_sets = run.legacy_sets(run.completed_at),
            "Backup sets past the legacy age"
        );

        RunOutcome::Published(run)
    }

    /// Stop accepting new runs.
    pub fn close(&self) {
        self.tasks.close();
    }

    /// Wait for the run in flight, if any, to publish.
    pub async fn wait_idle(&self) {
        let _running = self.running.lock().await;
    }

    /// Abort outstanding repository I/O. Locks already taken are still
    /// released.
    pub fn cancel_io(&self) {
        self.io_cancel.cancel();
    }

    /// Stop accepting runs and wait until every spawned repository task has
    /// released its lock and the run they belong to has published.
    pub async fn shutdown(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.wait_idle().await;
        debug!("All repository tasks finished");
    }
}
