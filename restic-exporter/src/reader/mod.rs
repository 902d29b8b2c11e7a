//! The seam between the collector and the storage backends.
//!
//! A reader opens a repository, hands back a source of snapshot summaries
//! and a lock. Whoever opens a repository must release its lock exactly
//! once, whatever happens while enumerating.

pub mod restic;

use crate::repos::RepositoryConfig;
use crate::utils::ReaderError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::stream::BoxStream;

pub use restic::ResticCliReader;

/// Summary of one snapshot: who took it, where, and when.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotSummary {
    pub owner: String,
    pub host: String,
    pub time: DateTime<Utc>,
}

/// Snapshot listing of an opened repository.
pub trait SnapshotSource: Send {
    /// Stream every snapshot in the repository. An `Err` item aborts the
    /// enumeration.
    fn snapshots(&mut self) -> BoxStream<'_, Result<SnapshotSummary, ReaderError>>;
}

/// Shared read lock held while a repository is open.
#[async_trait]
pub trait RepositoryLock: Send {
    /// Release the lock. Consumes the lock so it cannot be released twice.
    async fn release(self: Box<Self>) -> Result<(), ReaderError>;
}

/// A successfully opened repository.
pub struct OpenRepository {
    pub snapshots: Box<dyn SnapshotSource>,
    pub lock: Box<dyn RepositoryLock>,
}

#[async_trait]
pub trait RepositoryReader: Send + Sync + 'static {
    /// Open, authenticate and lock the repository for reading.
    async fn open(&self, repo: &RepositoryConfig) -> Result<OpenRepository, ReaderError>;
}
