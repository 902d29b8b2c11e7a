//! Folding snapshot summaries into per-(host, owner) backup sets.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Owner recorded for snapshots that carry no user name. Old restic
/// releases on macOS sometimes wrote an empty one.
pub const UNKNOWN_OWNER: &str = "UNKNOWN";

/// Age in days past which a set counts as aged out.
pub const LEGACY_AGE_DAYS: i64 = 60;

/// All snapshots of one host and owner within a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSet {
    pub host: String,
    pub owner: String,
    pub snapshot_count: u64,
    pub newest: DateTime<Utc>,
}

impl BackupSet {
    /// Whole days between the newest snapshot and `now`, truncated.
    pub fn day_age(&self, now: DateTime<Utc>) -> i64 {
        (now - self.newest).num_hours() / 24
    }

    /// Aged-out classification kept for compatibility with existing alert
    /// rules and series; do not change the threshold.
    pub fn is_legacy(&self, now: DateTime<Utc>) -> bool {
        self.day_age(now) > LEGACY_AGE_DAYS
    }
}

/// Accumulates the backup sets of a single repository.
///
/// Owned by exactly one repository task; not shared.
#[derive(Debug, Default)]
pub struct SnapshotAggregator {
    sets: HashMap<(String, String), BackupSet>,
}

impl SnapshotAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, owner: &str, host: &str, time: DateTime<Utc>) {
        let owner = if owner.is_empty() { UNKNOWN_OWNER } else { owner };

        let set = self
            .sets
            .entry((host.to_string(), owner.to_string()))
            .or_insert_with(|| BackupSet {
                host: host.to_string(),
                owner: owner.to_string(),
                snapshot_count: 0,
                newest: time,
            });

        if set.newest < time {
            set.newest = time;
        }
        set.snapshot_count += 1;
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Finished sets, sorted by host then owner for stable output.
    pub fn into_sets(self) -> Vec<BackupSet> {
        let mut sets: Vec<BackupSet> = self.sets.into_values().collect();
        sets.sort_by(|a, b| (&a.host, &a.owner).cmp(&(&b.host, &b.owner)));
        sets
    }
}
