//! Per-`ProcessQueue` counters, exported Prometheus-style.
//!
//! Grounded in the teacher's `metrics::ConsumerMetrics`: plain atomic
//! counters behind a struct, with an `export_prometheus` that formats
//! them in exposition format. With the `metrics` feature enabled the
//! counters are mirrored into a real `prometheus::Registry` and
//! exported through `TextEncoder`, same as the teacher's metrics
//! module does when its own `metrics` feature is on; without it,
//! export falls back to the hand-rolled formatting so this crate
//! never forces the `prometheus` dependency on a caller who doesn't
//! want it.

use std::sync::atomic::{AtomicU64, Ordering};

#[cfg(feature = "metrics")]
use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Debug, Default)]
pub struct Metrics {
    pub messages_received: AtomicU64,
    pub messages_pulled: AtomicU64,
    pub consume_ok: AtomicU64,
    pub consume_error: AtomicU64,
    pub messages_acked: AtomicU64,
    pub messages_nacked: AtomicU64,
    pub messages_sent_to_dlq: AtomicU64,
    pub fetch_errors: AtomicU64,
    #[cfg(feature = "metrics")]
    registry: PrometheusRegistry,
}

#[cfg(feature = "metrics")]
struct PrometheusRegistry {
    registry: Registry,
    counters: IntCounterVec,
}

#[cfg(feature = "metrics")]
impl std::fmt::Debug for PrometheusRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusRegistry").finish_non_exhaustive()
    }
}

#[cfg(feature = "metrics")]
impl Default for PrometheusRegistry {
    fn default() -> Self {
        let registry = Registry::new();
        let counters = IntCounterVec::new(Opts::new("process_queue_events_total", "ProcessQueue event counters"), &["kind"])
            .expect("static counter metadata is always valid");
        registry.register(Box::new(counters.clone())).expect("counter registered exactly once per registry");
        Self { registry, counters }
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bump an atomic counter and, when the `metrics` feature is on,
    /// the matching `kind` series in the Prometheus registry.
    fn bump(&self, _kind: &str, counter: &AtomicU64, count: u64) {
        counter.fetch_add(count, Ordering::Relaxed);
        #[cfg(feature = "metrics")]
        self.registry.counters.with_label_values(&[_kind]).inc_by(count);
    }

    pub fn record_received(&self, count: u64) {
        self.bump("received", &self.messages_received, count);
    }

    pub fn record_pulled(&self, count: u64) {
        self.bump("pulled", &self.messages_pulled, count);
    }

    pub fn record_consume_ok(&self, count: u64) {
        self.bump("consume_ok", &self.consume_ok, count);
    }

    pub fn record_consume_error(&self, count: u64) {
        self.bump("consume_error", &self.consume_error, count);
    }

    pub fn record_acked(&self, count: u64) {
        self.bump("acked", &self.messages_acked, count);
    }

    pub fn record_nacked(&self, count: u64) {
        self.bump("nacked", &self.messages_nacked, count);
    }

    pub fn record_sent_to_dlq(&self, count: u64) {
        self.bump("sent_to_dlq", &self.messages_sent_to_dlq, count);
    }

    pub fn record_fetch_error(&self) {
        self.bump("fetch_error", &self.fetch_errors, 1);
    }

    /// Render counters in Prometheus text exposition format, labeled by
    /// the owning queue's topic and queue id.
    ///
    /// With the `metrics` feature enabled this gathers from the real
    /// `Registry` via `TextEncoder`, so the output also carries
    /// whatever default process/build collectors a caller registered
    /// into the same registry. Without it, the counters are formatted
    /// by hand, without per-partition `topic`/`queue_id` labels on the
    /// Prometheus-native path since `IntCounterVec` is registered once
    /// per `Metrics` instance rather than per label set.
    pub fn export_prometheus(&self, topic: &str, queue_id: i32) -> String {
        #[cfg(feature = "metrics")]
        {
            let _ = (topic, queue_id);
            let families = self.registry.registry.gather();
            let mut buffer = Vec::new();
            TextEncoder::new().encode(&families, &mut buffer).expect("text encoding of a gathered metric family never fails");
            String::from_utf8(buffer).expect("prometheus text encoding is always valid utf8")
        }
        #[cfg(not(feature = "metrics"))]
        {
            let labels = format!("topic=\"{topic}\",queue_id=\"{queue_id}\"");
            let mut out = String::new();
            for (name, value) in [
                ("process_queue_messages_received_total", self.messages_received.load(Ordering::Relaxed)),
                ("process_queue_messages_pulled_total", self.messages_pulled.load(Ordering::Relaxed)),
                ("process_queue_consume_ok_total", self.consume_ok.load(Ordering::Relaxed)),
                ("process_queue_consume_error_total", self.consume_error.load(Ordering::Relaxed)),
                ("process_queue_messages_acked_total", self.messages_acked.load(Ordering::Relaxed)),
                ("process_queue_messages_nacked_total", self.messages_nacked.load(Ordering::Relaxed)),
                ("process_queue_messages_sent_to_dlq_total", self.messages_sent_to_dlq.load(Ordering::Relaxed)),
                ("process_queue_fetch_errors_total", self.fetch_errors.load(Ordering::Relaxed)),
            ] {
                out.push_str(&format!("{name}{{{labels}}} {value}\n"));
            }
            out
        }
    }
}
