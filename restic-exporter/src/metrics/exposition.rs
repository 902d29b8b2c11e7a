//! Prometheus text rendering of a collection run.
//!
//! Each scrape renders into its own registry built from the immutable run,
//! so scrapes never touch shared state. All values are gauges; counts and
//! ages shrink when snapshots are pruned.

use crate::collector::CollectionRun;
use chrono::{DateTime, Utc};
use prometheus::{Encoder, Gauge, GaugeVec, Opts, Registry, TextEncoder};

pub const NAMESPACE: &str = "backup";

/// Value of the `job` label carried by every series.
pub const JOB_NAME: &str = "backupReporter";

const SET_LABELS: &[&str] = &["url", "host", "user"];

/// Content type of the rendered text.
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}

#[derive(Debug, Clone)]
pub struct Exposition {
    instance: String,
}

impl Exposition {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    fn opts(&self, name: &str, help: &str) -> Opts {
        Opts::new(name, help)
            .namespace(NAMESPACE)
            .const_label("instance", self.instance.clone())
            .const_label("job", JOB_NAME)
    }

    fn gauge(&self, registry: &Registry, name: &str, help: &str) -> prometheus::Result<Gauge> {
        let gauge = Gauge::with_opts(self.opts(name, help))?;
        registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    fn gauge_vec(
        &self,
        registry: &Registry,
        name: &str,
        help: &str,
        labels: &[&str],
    ) -> prometheus::Result<GaugeVec> {
        let gauge = GaugeVec::new(self.opts(name, help), labels)?;
        registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    /// Render `run` as exposition text. Day ages are measured against `now`.
    pub fn render(&self, run: &CollectionRun, now: DateTime<Utc>) -> prometheus::Result<String> {
        let registry = Registry::new();

        let last_success = self.gauge(
            &registry,
            "job_last_success_unixtime",
            "Last time a batch job successfully finished",
        )?;
        let job_errors = self.gauge(
            &registry,
            "job_error_count",
            "Number of errors encountered by backup monitoring job",
        )?;
        let read_errors = self.gauge_vec(
            &registry,
            "read_error_count",
            "Number of errors encountered when reading backup",
            &["url"],
        )?;
        let snapshot_count = self.gauge_vec(
            &registry,
            "snapshot_count",
            "Number of snapshots in a backup set",
            SET_LABELS,
        )?;
        let newest = self.gauge_vec(
            &registry,
            "newest_timestamp",
            "Most recent snapshot timestamp in backup set",
            SET_LABELS,
        )?;
        let days_age = self.gauge_vec(
            &registry,
            "days_age",
            "Age in days since the most recent backup in a backup set",
            SET_LABELS,
        )?;

        last_success.set(run.completed_at.timestamp_micros() as f64 / 1e6);
        job_errors.set(run.error_count as f64);

        for repo in &run.repositories {
            read_errors
                .with_label_values(&[repo.url.as_str()])
                .set(repo.read_errors as f64);

            for set in &repo.sets {
                let labels = [repo.url.as_str(), set.host.as_str(), set.owner.as_str()];
                snapshot_count
                    .with_label_values(&labels)
                    .set(set.snapshot_count as f64);
                newest
                    .with_label_values(&labels)
                    .set(set.newest.timestamp() as f64);
                days_age
                    .with_label_values(&labels)
                    .set(set.day_age(now) as f64);
            }
        }

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Find the value of a sample in rendered text by name and label subset.
#[cfg(test)]
pub(crate) fn sample(text: &str, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.strip_prefix(name)
                .is_some_and(|rest| rest.starts_with('{') || rest.starts_with(' '))
        })
        .filter(|line| {
            labels
                .iter()
                .all(|(k, v)| line.contains(&format!("{}=\"{}\"", k, v)))
        })
        .find_map(|line| line.rsplit(' ').next()?.parse().ok())
}
