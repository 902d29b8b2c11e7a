//! Scriptable in-memory reader used by the collector tests.

use crate::reader::{
    OpenRepository, RepositoryLock, RepositoryReader, SnapshotSource, SnapshotSummary,
};
use crate::repos::{BackendConfig, RepositoryConfig};
use crate::utils::ReaderError;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

#[derive(Clone, Default)]
pub struct FakeRepo {
    open_fails: bool,
    items: Vec<SnapshotSummary>,
    fail_after: Option<usize>,
    panic: bool,
    hang: bool,
    gate: Option<watch::Receiver<bool>>,
}

impl FakeRepo {
    /// Repository holding `(owner, host, unix seconds)` snapshots.
    pub fn snapshots(items: &[(&str, &str, i64)]) -> Self {
        Self {
            items: items
                .iter()
                .map(|(owner, host, ts)| SnapshotSummary {
                    owner: owner.to_string(),
                    host: host.to_string(),
                    time: Utc.timestamp_opt(*ts, 0).unwrap(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn open_fails() -> Self {
        Self {
            open_fails: true,
            ..Self::default()
        }
    }

    pub fn hangs_reading() -> Self {
        Self {
            hang: true,
            ..Self::default()
        }
    }

    /// Yield `n` snapshots, then fail.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn panic_on_read(mut self) -> Self {
        self.panic = true;
        self
    }

    /// Hold enumeration until the gate flips to `true`.
    pub fn gated(mut self, gate: watch::Receiver<bool>) -> Self {
        self.gate = Some(gate);
        self
    }
}

struct Counters {
    releases: AtomicUsize,
    opened: watch::Sender<usize>,
}

#[derive(Clone)]
pub struct FakeReader {
    repos: Arc<Mutex<HashMap<String, FakeRepo>>>,
    counters: Arc<Counters>,
}

impl FakeReader {
    pub fn new() -> Self {
        let (opened, _) = watch::channel(0);
        Self {
            repos: Arc::new(Mutex::new(HashMap::new())),
            counters: Arc::new(Counters {
                releases: AtomicUsize::new(0),
                opened,
            }),
        }
    }

    pub fn with(self, url: &str, repo: FakeRepo) -> Self {
        self.repos.lock().unwrap().insert(url.to_string(), repo);
        self
    }

    pub fn config(url: &str) -> RepositoryConfig {
        RepositoryConfig {
            url: url.to_string(),
            password: "pw".to_string(),
            backend: BackendConfig::Default,
            disabled: false,
        }
    }

    pub fn opens(&self) -> usize {
        *self.counters.opened.borrow()
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// Wait until at least `n` opens have succeeded.
    pub async fn wait_opened(&self, n: usize) {
        let mut rx = self.counters.opened.subscribe();
        let _ = rx.wait_for(|opened| *opened >= n).await;
    }
}

#[async_trait]
impl RepositoryReader for FakeReader {
    async fn open(&self, repo: &RepositoryConfig) -> Result<OpenRepository, ReaderError> {
        let fake = self
            .repos
            .lock()
            .unwrap()
            .get(&repo.url)
            .cloned()
            .unwrap_or_default();

        if fake.open_fails {
            return Err(ReaderError::CommandFailed {
                status: "exit status: 1".into(),
                stderr: "Fatal: unable to open config file".into(),
            });
        }

        self.counters.opened.send_modify(|n| *n += 1);

        Ok(OpenRepository {
            snapshots: Box::new(FakeSource { repo: fake }),
            lock: Box::new(FakeLock {
                counters: self.counters.clone(),
            }),
        })
    }
}

struct FakeSource {
    repo: FakeRepo,
}

impl SnapshotSource for FakeSource {
    fn snapshots(&mut self) -> BoxStream<'_, Result<SnapshotSummary, ReaderError>> {
        let repo = self.repo.clone();
        let items: Vec<Result<SnapshotSummary, ReaderError>> = match repo.fail_after {
            Some(n) => repo
                .items
                .iter()
                .take(n)
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(ReaderError::Decode("injected".into()))))
                .collect(),
            None => repo.items.iter().cloned().map(Ok).collect(),
        };

        stream::once(async move {
            if let Some(mut gate) = repo.gate {
                let _ = gate.wait_for(|open| *open).await;
            }
            if repo.hang {
                std::future::pending::<()>().await;
            }
            if repo.panic {
                panic!("injected read panic");
            }
            stream::iter(items)
        })
        .flatten()
        .boxed()
    }
}

struct FakeLock {
    counters: Arc<Counters>,
}

#[async_trait]
impl RepositoryLock for FakeLock {
    async fn release(self: Box<Self>) -> Result<(), ReaderError> {
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
