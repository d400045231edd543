//! OpenTelemetry instruments for the engine
//!
//! Both sides of the engine report through one [`EngineMetrics`] value:
//! the dispatcher records inbound work, the call tracker records outbound
//! calls. Instruments are created from the global meter provider, so they
//! are no-ops until [`crate::telemetry::init_telemetry`] installs an
//! exporting provider.
//!
//! | Instrument                       | Kind      | Attributes           |
//! |----------------------------------|-----------|----------------------|
//! | `jrpc.dispatch.requests`         | counter   | method, kind, status |
//! | `jrpc.dispatch.duration`         | histogram | method, status       |
//! | `jrpc.dispatch.batch.size`       | histogram | mode                 |
//! | `jrpc.protocol.errors`           | counter   | reason               |
//! | `jrpc.calls.total`               | counter   | method               |
//! | `jrpc.calls.outcome`             | counter   | method, outcome      |
//! | `jrpc.calls.duration`            | histogram | method, outcome      |
//! | `jrpc.calls.pending`             | gauge     |                      |

use opentelemetry::{
    global,
    metrics::{Counter, Gauge, Histogram, Meter},
    KeyValue,
};

/// Name of the meter the instruments are registered under
pub const METER_NAME: &str = "jrpc";

pub struct EngineMetrics {
    dispatched: Counter<u64>,
    dispatch_duration: Histogram<f64>,
    batch_size: Histogram<u64>,
    protocol_errors: Counter<u64>,
    calls: Counter<u64>,
    call_outcomes: Counter<u64>,
    call_duration: Histogram<f64>,
    pending: Gauge<i64>,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::with_meter(&global::meter(METER_NAME))
    }

    pub fn with_meter(meter: &Meter) -> Self {
        Self {
            dispatched: meter
                .u64_counter("jrpc.dispatch.requests")
                .with_description("Inbound requests and notifications handled")
                .build(),
            dispatch_duration: meter
                .f64_histogram("jrpc.dispatch.duration")
                .with_description("Handler execution time in seconds")
                .build(),
            batch_size: meter
                .u64_histogram("jrpc.dispatch.batch.size")
                .with_description("Number of elements in inbound batches")
                .build(),
            protocol_errors: meter
                .u64_counter("jrpc.protocol.errors")
                .with_description("Inbound values rejected as parse errors or invalid requests")
                .build(),
            calls: meter
                .u64_counter("jrpc.calls.total")
                .with_description("Outbound requests sent")
                .build(),
            call_outcomes: meter
                .u64_counter("jrpc.calls.outcome")
                .with_description("Outbound requests settled, by outcome")
                .build(),
            call_duration: meter
                .f64_histogram("jrpc.calls.duration")
                .with_description("Time from send to settlement in seconds")
                .build(),
            pending: meter
                .i64_gauge("jrpc.calls.pending")
                .with_description("Outbound requests awaiting a reply")
                .build(),
        }
    }

    /// Record one handled request or notification
    pub fn record_dispatch(&self, method: &str, kind: &'static str, status: &'static str, duration_secs: f64) {
        self.dispatched.add(
            1,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("kind", kind),
                KeyValue::new("status", status),
            ],
        );
        self.dispatch_duration.record(
            duration_secs,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("status", status),
            ],
        );
    }

    pub fn record_batch(&self, size: u64, mode: &'static str) {
        self.batch_size.record(size, &[KeyValue::new("mode", mode)]);
    }

    pub fn record_protocol_error(&self, reason: &'static str) {
        self.protocol_errors.add(1, &[KeyValue::new("reason", reason)]);
    }

    /// Record an outbound request leaving
    pub fn record_call(&self, method: &str, pending: usize) {
        self.calls.add(1, &[KeyValue::new("method", method.to_string())]);
        self.record_pending(pending);
    }

    /// Record an outbound request settling
    pub fn record_settled(&self, method: &str, outcome: &'static str, duration_secs: f64, pending: usize) {
        let attributes = &[
            KeyValue::new("method", method.to_string()),
            KeyValue::new("outcome", outcome),
        ];
        self.call_outcomes.add(1, attributes);
        self.call_duration.record(duration_secs, attributes);
        self.record_pending(pending);
    }

    pub fn record_pending(&self, pending: usize) {
        self.pending.record(i64::try_from(pending).unwrap_or(i64::MAX), &[]);
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}
