//! Process settings from the command line and environment.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Settings {
    /// Bind address for the HTTP server (":port" listens on all interfaces)
    #[arg(long, env = "EXPORTER_BIND", default_value = ":9121")]
    pub bind: String,

    /// Path to the repository configuration file
    #[arg(long, env = "EXPORTER_CONFIG", default_value = "config.json")]
    pub config: PathBuf,

    /// Cron expression for how often to gather repository metrics
    #[arg(long, env = "EXPORTER_CRON", default_value = "0 0 * * *")]
    pub cron: String,

    /// IANA time zone the cron expression is evaluated in
    #[arg(long, env = "EXPORTER_TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Value of the `instance` label (defaults to the host name)
    #[arg(long, env = "EXPORTER_INSTANCE")]
    pub instance: Option<String>,

    /// Path to the restic binary
    #[arg(long, env = "RESTIC_BIN", default_value = "restic")]
    pub restic_bin: PathBuf,

    /// Seconds to wait for the HTTP server and a running collection on shutdown
    #[arg(long, env = "EXPORTER_SHUTDOWN_TIMEOUT", default_value_t = 60)]
    pub shutdown_timeout: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Settings {
    /// Address in a form `TcpListener::bind` accepts.
    pub fn listen_addr(&self) -> String {
        if self.bind.starts_with(':') {
            format!("0.0.0.0{}", self.bind)
        } else {
            self.bind.clone()
        }
    }

    pub fn instance_name(&self) -> String {
        self.instance
            .clone()
            .filter(|name| !name.is_empty())
            .or_else(|| hostname::get().ok().and_then(|h| h.into_string().ok()))
            .unwrap_or_else(|| "localhost".to_string())
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout)
    }
}
