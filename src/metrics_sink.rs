//! Narrow counter/gauge/histogram facade consumed by every subsystem.
//!
//! The core never owns exposition format; it only records observations
//! against named metrics with label pairs. `FacadeMetricsSink` forwards
//! those observations to the `metrics` crate's global recorder, leaving
//! whoever installs a recorder (Prometheus exporter, statsd, a test
//! collector) free to choose the wire format.

/// A single label attached to an observation.
pub type Label = (&'static str, String);

/// Counter/gauge/histogram observation hooks.
pub trait MetricsSink: Send + Sync {
    fn counter_inc(&self, name: &'static str, labels: &[Label], delta: u64);
    fn gauge_set(&self, name: &'static str, labels: &[Label], value: f64);
    fn histogram_observe(&self, name: &'static str, labels: &[Label], value: f64);
}

/// Discards every observation. Default for tests that don't assert on
/// telemetry.
#[derive(Clone, Copy, Default)]
pub struct NoopMetricsSink;

impl MetricsSink for NoopMetricsSink {
    fn counter_inc(&self, _name: &'static str, _labels: &[Label], _delta: u64) {}
    fn gauge_set(&self, _name: &'static str, _labels: &[Label], _value: f64) {}
    fn histogram_observe(&self, _name: &'static str, _labels: &[Label], _value: f64) {}
}

/// Forwards observations to the `metrics` crate's globally installed
/// recorder.
#[derive(Clone, Copy, Default)]
pub struct FacadeMetricsSink;

impl MetricsSink for FacadeMetricsSink {
    fn counter_inc(&self, name: &'static str, labels: &[Label], delta: u64) {
        match labels {
            [] => metrics::counter!(name).increment(delta),
            [(k1, v1)] => metrics::counter!(name, *k1 => v1.clone()).increment(delta),
            [(k1, v1), (k2, v2)] => {
                metrics::counter!(name, *k1 => v1.clone(), *k2 => v2.clone()).increment(delta)
            }
            _ => metrics::counter!(name).increment(delta),
        }
    }

    fn gauge_set(&self, name: &'static str, labels: &[Label], value: f64) {
        match labels {
            [] => metrics::gauge!(name).set(value),
            [(k1, v1)] => metrics::gauge!(name, *k1 => v1.clone()).set(value),
            [(k1, v1), (k2, v2)] => {
                metrics::gauge!(name, *k1 => v1.clone(), *k2 => v2.clone()).set(value)
            }
            _ => metrics::gauge!(name).set(value),
        }
    }

    fn histogram_observe(&self, name: &'static str, labels: &[Label], value: f64) {
        match labels {
            [] => metrics::histogram!(name).record(value),
            [(k1, v1)] => metrics::histogram!(name, *k1 => v1.clone()).record(value),
            [(k1, v1), (k2, v2)] => {
                metrics::histogram!(name, *k1 => v1.clone(), *k2 => v2.clone()).record(value)
            }
            _ => metrics::histogram!(name).record(value),
        }
    }
}
