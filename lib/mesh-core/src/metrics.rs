//! Metrics reporting for registration and publish paths

use crate::{MeshError, Result};
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::trace;

/// Tags attached to a single observation
pub type Tags = BTreeMap<String, String>;

/// Build tags from borrowed pairs
pub fn tags<'a, I>(pairs: I) -> Tags
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Sink for counters, gauges and timings
pub trait Reporter: Send + Sync {
    fn count(&self, id: &str, value: u64, tags: &Tags) -> Result<()>;
    fn gauge(&self, id: &str, value: f64, tags: &Tags) -> Result<()>;
    fn timing(&self, id: &str, value: Duration, tags: &Tags) -> Result<()>;
}

/// Reporter that drops every observation
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopReporter;

impl Reporter for NoopReporter {
    fn count(&self, _id: &str, _value: u64, _tags: &Tags) -> Result<()> {
        Ok(())
    }

    fn gauge(&self, _id: &str, _value: f64, _tags: &Tags) -> Result<()> {
        Ok(())
    }

    fn timing(&self, _id: &str, _value: Duration, _tags: &Tags) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
struct Families {
    counters: HashMap<String, IntCounterVec>,
    gauges: HashMap<String, GaugeVec>,
    histograms: HashMap<String, HistogramVec>,
}

/// Prometheus-backed reporter.
///
/// Metric families are created on first use and keyed by their sanitized
/// name, so ids differing only in punctuation share one family. Later
/// observations of a family must carry the same tag keys.
#[derive(Clone)]
pub struct PrometheusReporter {
    namespace: String,
    registry: Arc<Registry>,
    families: Arc<Mutex<Families>>,
}

fn prom_err(e: prometheus::Error) -> MeshError {
    MeshError::backend("prometheus", e)
}

fn metric_name(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

impl PrometheusReporter {
    pub fn new(namespace: &str) -> Self {
        Self {
            namespace: metric_name(namespace),
            registry: Arc::new(Registry::new()),
            families: Arc::new(Mutex::new(Families::default())),
        }
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer).map_err(prom_err)?;
        String::from_utf8(buffer).map_err(|e| MeshError::backend("prometheus", e))
    }

    fn families(&self) -> Result<std::sync::MutexGuard<'_, Families>> {
        self.families
            .lock()
            .map_err(|_| MeshError::backend("prometheus", "metric families lock poisoned"))
    }

    fn opts(&self, name: &str, help: &str) -> Opts {
        Opts::new(name, help).namespace(self.namespace.clone())
    }
}

fn label_names(tags: &Tags) -> Vec<&str> {
    tags.keys().map(String::as_str).collect()
}

fn label_values(tags: &Tags) -> Vec<&str> {
    tags.values().map(String::as_str).collect()
}

impl Reporter for PrometheusReporter {
    fn count(&self, id: &str, value: u64, tags: &Tags) -> Result<()> {
        let name = metric_name(id);
        let mut families = self.families()?;
        if !families.counters.contains_key(&name) {
            let vec = IntCounterVec::new(self.opts(&name, "Counter"), &label_names(tags))
                .map_err(prom_err)?;
            self.registry.register(Box::new(vec.clone())).map_err(prom_err)?;
            families.counters.insert(name.clone(), vec);
        }
        if let Some(vec) = families.counters.get(&name) {
            vec.get_metric_with_label_values(&label_values(tags))
                .map_err(prom_err)?
                .inc_by(value);
        }
        trace!(id, value, "Counted");
        Ok(())
    }

    fn gauge(&self, id: &str, value: f64, tags: &Tags) -> Result<()> {
        let name = metric_name(id);
        let mut families = self.families()?;
        if !families.gauges.contains_key(&name) {
            let vec =
                GaugeVec::new(self.opts(&name, "Gauge"), &label_names(tags)).map_err(prom_err)?;
            self.registry.register(Box::new(vec.clone())).map_err(prom_err)?;
            families.gauges.insert(name.clone(), vec);
        }
        if let Some(vec) = families.gauges.get(&name) {
            vec.get_metric_with_label_values(&label_values(tags))
                .map_err(prom_err)?
                .set(value);
        }
        Ok(())
    }

    fn timing(&self, id: &str, value: Duration, tags: &Tags) -> Result<()> {
        let name = metric_name(id);
        let mut families = self.families()?;
        if !families.histograms.contains_key(&name) {
            let opts: HistogramOpts = self.opts(&name, "Timing in seconds").into();
            let vec = HistogramVec::new(opts, &label_names(tags)).map_err(prom_err)?;
            self.registry.register(Box::new(vec.clone())).map_err(prom_err)?;
            families.histograms.insert(name.clone(), vec);
        }
        if let Some(vec) = families.histograms.get(&name) {
            vec.get_metric_with_label_values(&label_values(tags))
                .map_err(prom_err)?
                .observe(value.as_secs_f64());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_and_gather() {
        let reporter = PrometheusReporter::new("mesh");
        let t = tags([("topic", "orders"), ("status", "ok")]);
        reporter.count("publish_total", 1, &t).unwrap();
        reporter.count("publish_total", 2, &t).unwrap();

        let text = reporter.gather().unwrap();
        assert!(text.contains("mesh_publish_total"));
        assert!(text.contains("topic=\"orders\""));
        assert!(text.contains("} 3"));
    }

    #[test]
    fn test_gauge_and_timing() {
        let reporter = PrometheusReporter::new("mesh");
        reporter.gauge("nodes", 2.0, &Tags::new()).unwrap();
        reporter
            .timing("register.duration", Duration::from_millis(250), &tags([("service", "svc")]))
            .unwrap();

        let text = reporter.gather().unwrap();
        assert!(text.contains("mesh_nodes 2"));
        assert!(text.contains("mesh_register_duration_count{service=\"svc\"} 1"));
    }

    #[test]
    fn test_mismatched_tags_rejected() {
        let reporter = PrometheusReporter::new("mesh");
        reporter.count("calls", 1, &tags([("a", "1")])).unwrap();
        assert!(reporter.count("calls", 1, &Tags::new()).is_err());
    }

    #[test]
    fn test_punctuation_variants_share_family() {
        let reporter = PrometheusReporter::new("mesh");
        let t = tags([("status", "ok")]);
        reporter.count("broker.publish", 1, &t).unwrap();
        reporter.count("broker_publish", 1, &t).unwrap();
        reporter
            .timing("broker.publish.duration", Duration::from_millis(5), &t)
            .unwrap();
        reporter
            .timing("broker-publish-duration", Duration::from_millis(5), &t)
            .unwrap();

        let text = reporter.gather().unwrap();
        assert!(text.contains("mesh_broker_publish{status=\"ok\"} 2"));
        assert!(text.contains("mesh_broker_publish_duration_count{status=\"ok\"} 2"));
    }

    #[test]
    fn test_noop_reporter() {
        let reporter = NoopReporter;
        assert!(reporter.count("x", 1, &Tags::new()).is_ok());
        assert!(reporter.timing("x", Duration::ZERO, &Tags::new()).is_ok());
    }
}
