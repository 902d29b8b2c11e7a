//! Single control loop serving reload, trigger and shutdown requests.
//!
//! Signals and the scheduler never act directly; they enqueue a
//! [`ControlCommand`] and the loop dispatches it.

use super::scheduler::CollectionScheduler;
use crate::collector::{Collector, RunOutcome};
use crate::repos::{load_file, ConfigStore};
use crate::secrets::SecretResolver;
use crate::utils::ConfigError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const COMMAND_QUEUE_DEPTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    Reload,
    Trigger,
    Shutdown,
}

/// Sending side of the control queue.
#[derive(Clone, Debug)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub fn channel() -> (Self, mpsc::Receiver<ControlCommand>) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        (Self { tx }, rx)
    }

    async fn send(&self, command: ControlCommand) {
        if self.tx.send(command).await.is_err() {
            warn!(?command, "Control loop has exited, command ignored");
        }
    }

    pub async fn reload(&self) {
        self.send(ControlCommand::Reload).await;
    }

    pub async fn trigger(&self) {
        self.send(ControlCommand::Trigger).await;
    }

    pub async fn shutdown(&self) {
        self.send(ControlCommand::Shutdown).await;
    }
}

/// Where the repository list comes from.
pub struct ConfigSource {
    pub path: PathBuf,
    pub resolver: Option<Arc<dyn SecretResolver>>,
}

impl ConfigSource {
    /// Load the file and swap it in. On error the previous list stays.
    pub async fn reload(&self, store: &ConfigStore) -> Result<(), ConfigError> {
        let configs = load_file(&self.path, self.resolver.as_deref()).await?;
        store.swap(configs);
        Ok(())
    }
}

/// Running HTTP server and the token that starts its graceful shutdown.
pub struct ServerHandle {
    pub shutdown: CancellationToken,
    pub task: JoinHandle<std::io::Result<()>>,
}

pub struct ControlPlane {
    pub collector: Arc<Collector>,
    pub config: Arc<ConfigStore>,
    pub source: ConfigSource,
    pub scheduler: Option<CollectionScheduler>,
    pub server: Option<ServerHandle>,
    /// Upper bound on waiting for the HTTP server and the run in flight.
    pub drain_timeout: Duration,
}

impl ControlPlane {
    /// Serve commands until a shutdown is requested or every handle is
    /// dropped, then drain.
    pub async fn run(self, mut commands: mpsc::Receiver<ControlCommand>) {
        while let Some(command) = commands.recv().await {
            match command {
                ControlCommand::Reload => self.reload().await,
                ControlCommand::Trigger => {
                    self.trigger();
                }
                ControlCommand::Shutdown => break,
            }
        }

        self.shutdown().await;
    }

    async fn reload(&self) {
        info!(path = %self.source.path.display(), "Reloading configuration");
        if let Err(e) = self.source.reload(&self.config).await {
            error!(error = %e, "Error reloading configuration, keeping previous");
        }
    }

    fn trigger(&self) -> JoinHandle<RunOutcome> {
        info!("Collection requested");
        let collector = self.collector.clone();
        tokio::spawn(async move { collector.try_run().await })
    }

    async fn shutdown(self) {
        info!(timeout_secs = self.drain_timeout.as_secs(), "Shutdown requested, draining");

        if let Some(scheduler) = self.scheduler {
            if let Err(e) = scheduler.shutdown().await {
                warn!(error = %e, "Scheduler shutdown error");
            }
        }

        self.collector.close();

        let server_task = self.server.map(|server| {
            server.shutdown.cancel();
            server.task
        });

        let collector = self.collector.clone();
        let drained = tokio::time::timeout(self.drain_timeout, async move {
            if let Some(task) = server_task {
                match task.await {
                    Ok(Ok(())) => info!("HTTP server stopped"),
                    Ok(Err(e)) => error!(error = %e, "HTTP server error during shutdown"),
                    Err(e) => error!(error = %e, "HTTP server task panicked"),
                }
            }
            collector.wait_idle().await;
        })
        .await;

        if drained.is_err() {
            warn!("Drain timed out, cancelling repository I/O");
            self.collector.cancel_io();
        }

        // Locks taken by repository tasks must be released before exit
        self.collector.shutdown().await;
        info!("Shutdown complete");
    }
}
