//! Restic Exporter - Main entry point

use anyhow::{Context, Result};
use clap::Parser;
use restic_exporter::api::{self, AppState};
use restic_exporter::daemon::{
    signals, CollectionScheduler, ConfigSource, ControlHandle, ControlPlane, ServerHandle,
};
use restic_exporter::metrics::Exposition;
use restic_exporter::reader::ResticCliReader;
use restic_exporter::secrets::vault::{VaultClient, VaultSettings};
use restic_exporter::secrets::SecretResolver;
use restic_exporter::{utils, Collector, ConfigStore, MetricsStore, Settings};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::parse();

    utils::logger::init(&settings.log_level)?;

    tracing::info!("Starting restic-exporter v{}", env!("CARGO_PKG_VERSION"));

    // Secret resolution is optional
    let resolver: Option<Arc<dyn SecretResolver>> =
        match VaultSettings::from_env().context("Error configuring vault")? {
            Some(vault) => {
                let client = VaultClient::connect(vault)
                    .await
                    .context("Error authenticating vault")?;
                Some(Arc::new(client) as Arc<dyn SecretResolver>)
            }
            None => {
                tracing::warn!("VAULT_ADDR not found in environment, Vault is disabled");
                None
            }
        };

    let source = ConfigSource {
        path: settings.config.clone(),
        resolver,
    };
    let config = Arc::new(ConfigStore::default());
    source
        .reload(&config)
        .await
        .context("Error loading configuration")?;

    let metrics = Arc::new(MetricsStore::new());
    let collector = Arc::new(Collector::new(
        Arc::new(ResticCliReader::new(&settings.restic_bin)),
        config.clone(),
        metrics.clone(),
    ));

    // Signals queue up until the control loop runs, so a SIGTERM during
    // the startup collection still drains and releases locks
    let (control, commands) = ControlHandle::channel();
    let _signals = signals::spawn_signal_listener(control.clone())
        .context("Error installing signal handlers")?;

    let scheduler = CollectionScheduler::new(&settings.cron, &settings.timezone, control.clone())
        .await
        .context("Error configuring scheduler")?;

    // Metrics must exist before the first scrape is accepted
    tracing::info!("Synchronously collecting metrics once at startup");
    collector.try_run().await;

    scheduler.start().await.context("Error starting scheduler")?;

    let addr = settings.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Error binding {}", addr))?;
    tracing::info!("HTTP server listening on {}", addr);

    let app = api::create_router(AppState::new(
        metrics.clone(),
        Exposition::new(settings.instance_name()),
    ));
    let http_shutdown = CancellationToken::new();
    let server_task = tokio::spawn({
        let token = http_shutdown.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
        }
    });

    let plane = ControlPlane {
        collector,
        config,
        source,
        scheduler: Some(scheduler),
        server: Some(ServerHandle {
            shutdown: http_shutdown,
            task: server_task,
        }),
        drain_timeout: settings.drain_timeout(),
    };
    plane.run(commands).await;

    Ok(())
}
