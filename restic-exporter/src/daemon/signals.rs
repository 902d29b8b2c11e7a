//! Process signals mapped onto control commands.
//!
//! - SIGHUP: reload the repository configuration
//! - SIGUSR1: collect now
//! - SIGINT / SIGTERM: graceful shutdown

use super::control::ControlHandle;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::info;

/// Install the handlers and forward signals until shutdown is requested.
pub fn spawn_signal_listener(control: ControlHandle) -> std::io::Result<JoinHandle<()>> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut user1 = signal(SignalKind::user_defined1())?;
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = hangup.recv() => {
                    info!("Received SIGHUP, reloading configuration");
                    control.reload().await;
                }
                _ = user1.recv() => {
                    info!("Received SIGUSR1, starting collection");
                    control.trigger().await;
                }
                _ = interrupt.recv() => {
                    info!("Received SIGINT, initiating graceful shutdown");
                    control.shutdown().await;
                    break;
                }
                _ = terminate.recv() => {
                    info!("Received SIGTERM, initiating graceful shutdown");
                    control.shutdown().await;
                    break;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::ControlCommand;
    use std::time::Duration;

    fn send_signal(name: &str) {
        let status = std::process::Command::new("kill")
            .args([format!("-{}", name), std::process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[tokio::test]
    async fn test_signals_enqueue_commands() {
        let (control, mut rx) = ControlHandle::channel();
        let listener = spawn_signal_listener(control).unwrap();

        send_signal("USR1");
        let command = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(command, Some(ControlCommand::Trigger));

        send_signal("HUP");
        let command = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await.unwrap();
        assert_eq!(command, Some(ControlCommand::Reload));

        listener.abort();
    }
}
