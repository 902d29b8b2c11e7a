use super::aggregator::BackupSet;
use chrono::{DateTime, Utc};

/// Outcome of scanning one repository during a run.
///
/// A failed scan carries no backup sets at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryResult {
    pub url: String,
    pub read_errors: u64,
    pub sets: Vec<BackupSet>,
}

impl RepositoryResult {
    pub fn success(url: impl Into<String>, sets: Vec<BackupSet>) -> Self {
        Self {
            url: url.into(),
            read_errors: 0,
            sets,
        }
    }

    pub fn failed(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            read_errors: 1,
            sets: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.read_errors > 0
    }
}

/// One completed pass across all enabled repositories. Never mutated after
/// it is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRun {
    pub completed_at: DateTime<Utc>,
    pub error_count: u64,
    pub repositories: Vec<RepositoryResult>,
}

impl CollectionRun {
    pub fn new(completed_at: DateTime<Utc>, mut repositories: Vec<RepositoryResult>) -> Self {
        repositories.sort_by(|a, b| a.url.cmp(&b.url));
        let error_count = repositories.iter().map(|r| r.read_errors).sum();
        Self {
            completed_at,
            error_count,
            repositories,
        }
    }

    pub fn repository(&self, url: &str) -> Option<&RepositoryResult> {
        self.repositories.iter().find(|r| r.url == url)
    }

    /// Backup sets whose newest snapshot is older than the legacy threshold.
    pub fn legacy_sets(&self, now: DateTime<Utc>) -> usize {
        self.repositories
            .iter()
            .flat_map(|r| r.sets.iter())
            .filter(|set| set.is_legacy(now))
            .count()
    }
}
