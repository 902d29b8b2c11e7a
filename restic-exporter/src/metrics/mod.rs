//! The last published collection run and its exposition.

pub mod exposition;

use crate::collector::CollectionRun;
use arc_swap::ArcSwapOption;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub use exposition::{Exposition, JOB_NAME, NAMESPACE};

/// Holder of the latest [`CollectionRun`].
///
/// One writer publishes by swapping the pointer; readers load it without
/// locking and keep whatever run they loaded for as long as they need it.
#[derive(Default)]
pub struct MetricsStore {
    latest: ArcSwapOption<CollectionRun>,
    publications: AtomicU64,
}

impl MetricsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, run: Arc<CollectionRun>) {
        self.latest.store(Some(run));
        self.publications.fetch_add(1, Ordering::Release);
    }

    /// `None` until the first run has been published.
    pub fn latest(&self) -> Option<Arc<CollectionRun>> {
        self.latest.load_full()
    }

    pub fn publications(&self) -> u64 {
        self.publications.load(Ordering::Acquire)
    }
}
