//! Logging configuration using tracing.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Crates whose per-tick and per-connection chatter would drown out the
/// collection logs.
const QUIET_TARGETS: &[&str] = &["tokio_cron_scheduler", "hyper", "hyper_util", "reqwest"];

/// Filter directives for `level`, with dependency noise capped at `warn`.
pub fn default_directives(level: &str) -> String {
    let mut directives = vec![level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{}=warn", target)));
    directives.join(",")
}

/// Install the global subscriber. `RUST_LOG` replaces the defaults entirely
/// when set; an unparsable `--log-level` falls back to `info`.
pub fn init(level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(level)))
        .unwrap_or_else(|_| EnvFilter::new(default_directives("info")));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("debug,"));
        assert!(directives.contains("tokio_cron_scheduler=warn"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(EnvFilter::try_new(default_directives("restic_exporter=verbose")).is_err());
    }
}
