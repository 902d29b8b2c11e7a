//! Repository configuration and the hot-swappable store that holds it.

pub mod loader;

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::Arc;

pub use loader::{load_file, parse_entries, ConfigEntry};

/// Backend-specific settings, decided once when the file is loaded.
#[derive(Clone, PartialEq, Eq)]
pub enum BackendConfig {
    /// No extra settings; the URL carries everything the backend needs.
    Default,
    /// Backblaze B2 account override.
    B2 { account_id: String, key: String },
}

impl fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => f.write_str("Default"),
            Self::B2 { account_id, .. } => f
                .debug_struct("B2")
                .field("account_id", account_id)
                .field("key", &"<redacted>")
                .finish(),
        }
    }
}

/// One repository as loaded from the configuration file.
#[derive(Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Repository URL; also the identity used in metric labels.
    pub url: String,
    /// Resolved repository password.
    pub password: String,
    pub backend: BackendConfig,
    pub disabled: bool,
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("url", &self.url)
            .field("password", &"<redacted>")
            .field("backend", &self.backend)
            .field("disabled", &self.disabled)
            .finish()
    }
}

/// Immutable list of repositories shared by a run.
pub type RepositoryList = Arc<Vec<RepositoryConfig>>;

/// Holds the current repository list.
///
/// Reloads replace the whole list; a reader holding a snapshot keeps seeing
/// the list it loaded.
pub struct ConfigStore {
    current: ArcSwap<Vec<RepositoryConfig>>,
}

impl ConfigStore {
    pub fn new(initial: Vec<RepositoryConfig>) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
        }
    }

    /// Consistent snapshot of the current list.
    pub fn snapshot(&self) -> RepositoryList {
        self.current.load_full()
    }

    /// Replace the list wholesale.
    pub fn swap(&self, list: Vec<RepositoryConfig>) {
        let previous = self.current.swap(Arc::new(list));
        tracing::info!(
            previous = previous.len(),
            current = self.current.load().len(),
            "Repository configuration swapped"
        );
    }
}

impl Default for ConfigStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
