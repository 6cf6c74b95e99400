//! Conversion of collected samples into Prometheus metric families.
//!
//! Collectors produce a flat, ordered list of [`Sample`]s per scrape. The
//! samples are turned into fresh gauges here, so nothing is retained between
//! scrapes.

use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{Gauge, GaugeVec, Opts};
use tracing::{error, warn};

/// Static metadata of an exported gauge.
pub trait MetricDef: Copy + PartialEq + std::fmt::Debug + 'static {
    fn name(self) -> &'static str;
    fn help(self) -> &'static str;
    fn label_names(self) -> &'static [&'static str];
}

/// One gauge value emitted during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<M> {
    pub metric: M,
    /// Label values, in the order of the metric's label names.
    pub labels: Vec<String>,
    pub value: f64,
}

impl<M: MetricDef> Sample<M> {
    pub fn unlabeled(metric: M, value: f64) -> Self {
        Self {
            metric,
            labels: Vec::new(),
            value,
        }
    }

    pub fn labeled(metric: M, labels: Vec<String>, value: f64) -> Self {
        Self {
            metric,
            labels,
            value,
        }
    }

    /// Value of the label with the given name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric
            .label_names()
            .iter()
            .position(|l| *l == name)
            .and_then(|idx| self.labels.get(idx))
            .map(String::as_str)
    }
}

/// Builds metric families from samples, one family per metric in order of
/// first appearance.
pub fn encode_samples<M: MetricDef>(samples: &[Sample<M>]) -> Vec<MetricFamily> {
    let mut by_metric: Vec<(M, Vec<&Sample<M>>)> = Vec::new();
    for sample in samples {
        match by_metric.iter_mut().find(|(m, _)| *m == sample.metric) {
            Some((_, entries)) => entries.push(sample),
            None => by_metric.push((sample.metric, vec![sample])),
        }
    }

    let mut families = Vec::with_capacity(by_metric.len());
    for (metric, entries) in by_metric {
        let opts = Opts::new(metric.name(), metric.help());
        let label_names = metric.label_names();

        if label_names.is_empty() {
            match Gauge::with_opts(opts) {
                Ok(gauge) => {
                    for sample in entries {
                        gauge.set(sample.value);
                    }
                    families.extend(gauge.collect());
                }
                Err(e) => error!("Failed to create gauge {}: {}", metric.name(), e),
            }
            continue;
        }

        match GaugeVec::new(opts, label_names) {
            Ok(vec) => {
                for sample in entries {
                    let values: Vec<&str> = sample.labels.iter().map(String::as_str).collect();
                    match vec.get_metric_with_label_values(&values) {
                        Ok(gauge) => gauge.set(sample.value),
                        Err(e) => warn!(
                            "Dropping sample of {} with labels {:?}: {}",
                            metric.name(),
                            sample.labels,
                            e
                        ),
                    }
                }
                families.extend(vec.collect());
            }
            Err(e) => error!("Failed to create gauge vector {}: {}", metric.name(), e),
        }
    }

    families
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum TestMetric {
        Plain,
        Grouped,
    }

    impl MetricDef for TestMetric {
        fn name(self) -> &'static str {
            match self {
                TestMetric::Plain => "test_plain",
                TestMetric::Grouped => "test_grouped",
            }
        }

        fn help(self) -> &'static str {
            "test metric"
        }

        fn label_names(self) -> &'static [&'static str] {
            match self {
                TestMetric::Plain => &[],
                TestMetric::Grouped => &["host"],
            }
        }
    }

    #[test]
    fn test_families_follow_first_appearance() {
        let samples = vec![
            Sample::unlabeled(TestMetric::Plain, 7.0),
            Sample::labeled(TestMetric::Grouped, vec!["a".into()], 1.0),
            Sample::labeled(TestMetric::Grouped, vec!["b".into()], 2.0),
        ];
        let families = encode_samples(&samples);
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].name(), "test_plain");
        assert_eq!(families[0].get_metric()[0].get_gauge().value(), 7.0);
        assert_eq!(families[1].name(), "test_grouped");
        assert_eq!(families[1].get_metric().len(), 2);
    }

    #[test]
    fn test_wrong_label_count_is_dropped() {
        let samples = vec![Sample::labeled(TestMetric::Grouped, vec![], 1.0)];
        let families = encode_samples(&samples);
        assert!(families.iter().all(|f| f.get_metric().is_empty()));
    }

    #[test]
    fn test_label_lookup() {
        let sample = Sample::labeled(TestMetric::Grouped, vec!["hostA".into()], 1.0);
        assert_eq!(sample.label("host"), Some("hostA"));
        assert_eq!(sample.label("missing"), None);
    }
}
