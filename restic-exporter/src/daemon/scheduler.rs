//! Calendar-driven collection triggers.

use super::control::ControlHandle;
use crate::utils::SchedulerError;
use chrono_tz::Tz;
use tokio_cron_scheduler::{Job, JobScheduler};

/// Accept 5-field (minute precision) and 6/7-field (with seconds) cron
/// expressions; the scheduler wants seconds.
pub fn normalize_cron(expr: &str) -> Result<String, SchedulerError> {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(SchedulerError::InvalidCron {
            expr: expr.to_string(),
            reason: format!("expected 5 to 7 fields, got {}", n),
        }),
    }
}

pub fn parse_timezone(name: &str) -> Result<Tz, SchedulerError> {
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimeZone(name.to_string()))
}

pub struct CollectionScheduler {
    scheduler: JobScheduler,
    expr: String,
    timezone: Tz,
}

impl CollectionScheduler {
    /// Build a scheduler that asks the control plane for a collection on
    /// every tick of `cron`, evaluated in `timezone`. Not started yet.
    pub async fn new(
        cron: &str,
        timezone: &str,
        control: ControlHandle,
    ) -> Result<Self, SchedulerError> {
        let expr = normalize_cron(cron)?;
        let timezone = parse_timezone(timezone)?;

        let job = Job::new_async_tz(expr.as_str(), timezone, move |_uuid, _lock| {
            let control = control.clone();
            Box::pin(async move {
                tracing::info!("Scheduled collection due");
                control.trigger().await;
            })
        })
        .map_err(|e| SchedulerError::InvalidCron {
            expr: expr.clone(),
            reason: e.to_string(),
        })?;

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;
        scheduler
            .add(job)
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;

        Ok(Self {
            scheduler,
            expr,
            timezone,
        })
    }

    pub async fn start(&self) -> Result<(), SchedulerError> {
        self.scheduler
            .start()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;
        tracing::info!(cron = %self.expr, timezone = %self.timezone, "Collection scheduler started");
        Ok(())
    }

    pub async fn shutdown(mut self) -> Result<(), SchedulerError> {
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| SchedulerError::Scheduler(e.to_string()))?;
        tracing::info!("Collection scheduler stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::daemon::ControlCommand;
    use std::time::Duration;

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 0 * * *").unwrap(), "0 0 0 * * *");
        assert_eq!(normalize_cron("  30   2 * * 1 ").unwrap(), "0 30 2 * * 1");
        assert_eq!(normalize_cron("15 0 0 * * *").unwrap(), "15 0 0 * * *");
        assert!(matches!(
            normalize_cron("* * *"),
            Err(SchedulerError::InvalidCron { .. })
        ));
        assert!(normalize_cron("").is_err());
    }

    #[test]
    fn test_parse_timezone() {
        assert_eq!(parse_timezone("UTC").unwrap(), Tz::UTC);
        assert_eq!(parse_timezone("Europe/Berlin").unwrap(), Tz::Europe__Berlin);
        assert!(matches!(
            parse_timezone("Mars/Olympus"),
            Err(SchedulerError::InvalidTimeZone(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_malformed_expression() {
        let (control, _rx) = ControlHandle::channel();
        let result = CollectionScheduler::new("61 * * * *", "UTC", control).await;
        assert!(matches!(result, Err(SchedulerError::InvalidCron { .. })));
    }

    #[tokio::test]
    async fn test_builds_valid_schedule() {
        let (control, _rx) = ControlHandle::channel();
        let scheduler = CollectionScheduler::new("0 0 * * *", "America/New_York", control)
            .await
            .unwrap();
        assert_eq!(scheduler.expr, "0 0 0 * * *");
    }

    #[tokio::test]
    async fn test_tick_enqueues_trigger() {
        let (control, mut rx) = ControlHandle::channel();
        let scheduler = CollectionScheduler::new("* * * * * *", "Europe/Berlin", control)
            .await
            .unwrap();
        scheduler.start().await.unwrap();

        let command = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(command, Some(ControlCommand::Trigger));

        scheduler.shutdown().await.unwrap();
    }
}
