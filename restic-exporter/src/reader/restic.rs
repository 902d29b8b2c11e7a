//! Reader backed by the `restic` command line tool.
//!
//! Only the REST server and Backblaze B2 backends are wired in; both need
//! nothing beyond the URL and, for B2, an account override. Credentials go
//! through the child's environment, never its argument list.

use super::{OpenRepository, RepositoryLock, RepositoryReader, SnapshotSource, SnapshotSummary};
use crate::repos::{BackendConfig, RepositoryConfig};
use crate::utils::ReaderError;
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use futures_util::stream::{self, BoxStream, StreamExt};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const SUPPORTED_SCHEMES: &[&str] = &["rest:", "b2:"];

/// Subset of `restic snapshots --json` output the exporter needs.
#[derive(Debug, Deserialize)]
struct ResticSnapshot {
    time: DateTime<FixedOffset>,
    #[serde(default)]
    hostname: String,
    #[serde(default)]
    username: String,
}

impl From<ResticSnapshot> for SnapshotSummary {
    fn from(sn: ResticSnapshot) -> Self {
        SnapshotSummary {
            owner: sn.username,
            host: sn.hostname,
            time: sn.time.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResticCliReader {
    binary: PathBuf,
}

impl ResticCliReader {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ResticCliReader {
    fn default() -> Self {
        Self::new("restic")
    }
}

fn check_backend(url: &str) -> Result<(), ReaderError> {
    if SUPPORTED_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
        Ok(())
    } else {
        Err(ReaderError::UnsupportedBackend(url.to_string()))
    }
}

async fn run_restic(
    binary: &Path,
    repo: &RepositoryConfig,
    args: &[&str],
) -> Result<Vec<u8>, ReaderError> {
    let mut cmd = Command::new(binary);
    cmd.args(args)
        .env("RESTIC_REPOSITORY", &repo.url)
        .env("RESTIC_PASSWORD", &repo.password)
        .env_remove("RESTIC_PASSWORD_FILE")
        .env_remove("RESTIC_PASSWORD_COMMAND")
        .stdin(Stdio::null())
        .kill_on_drop(true);

    if let BackendConfig::B2 { account_id, key } = &repo.backend {
        cmd.env("B2_ACCOUNT_ID", account_id).env("B2_ACCOUNT_KEY", key);
    }

    let output = cmd.output().await?;
    if !output.status.success() {
        return Err(ReaderError::CommandFailed {
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(output.stdout)
}

fn decode_snapshots(raw: &[u8]) -> Result<Vec<SnapshotSummary>, ReaderError> {
    let snapshots: Vec<ResticSnapshot> =
        serde_json::from_slice(raw).map_err(|e| ReaderError::Decode(e.to_string()))?;
    Ok(snapshots.into_iter().map(SnapshotSummary::from).collect())
}

#[async_trait]
impl RepositoryReader for ResticCliReader {
    async fn open(&self, repo: &RepositoryConfig) -> Result<OpenRepository, ReaderError> {
        check_backend(&repo.url)?;

        // Fails on an unreachable backend, a missing repository or a wrong key
        let config = run_restic(&self.binary, repo, &["cat", "config", "--no-lock"]).await?;
        if config.is_empty() {
            return Err(ReaderError::Decode("empty repository config".into()));
        }

        Ok(OpenRepository {
            snapshots: Box::new(ResticSnapshots {
                binary: self.binary.clone(),
                repo: repo.clone(),
            }),
            lock: Box::new(ResticLock {
                url: repo.url.clone(),
            }),
        })
    }
}

struct ResticSnapshots {
    binary: PathBuf,
    repo: RepositoryConfig,
}

impl SnapshotSource for ResticSnapshots {
    fn snapshots(&mut self) -> BoxStream<'_, Result<SnapshotSummary, ReaderError>> {
        let listing = async move {
            // restic takes a non-exclusive lock for the duration of the listing
            let raw = run_restic(&self.binary, &self.repo, &["snapshots", "--json"]).await?;
            decode_snapshots(&raw)
        };

        stream::once(listing)
            .flat_map(|result| match result {
                Ok(items) => stream::iter(items.into_iter().map(Ok).collect::<Vec<_>>()),
                Err(e) => stream::iter(vec![Err(e)]),
            })
            .boxed()
    }
}

/// restic scopes its shared lock to each invocation, so nothing is left to
/// remove once the listing child has exited or been killed.
struct ResticLock {
    url: String,
}

#[async_trait]
impl RepositoryLock for ResticLock {
    async fn release(self: Box<Self>) -> Result<(), ReaderError> {
        tracing::debug!(repo = %self.url, "Repository lock released");
        Ok(())
    }
}
