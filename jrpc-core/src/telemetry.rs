//! Logging and OpenTelemetry setup
//!
//! The engine itself only emits `tracing` events and records metrics on
//! the global meter. Applications call [`init_telemetry`] once at startup to
//! decide where those go:
//!
//! - structured JSON logs on stdout, filtered by `RUST_LOG` or the configured level
//! - when an OTLP endpoint is configured, spans and metrics exported over gRPC
//!
//! ```rust,no_run
//! use jrpc_core::TelemetryConfig;
//!
//! let guard = jrpc_core::init_telemetry(
//!     TelemetryConfig::new("billing-peer")
//!         .with_endpoint("http://localhost:4317")
//!         .with_log_level("debug"),
//! )
//! .expect("telemetry");
//!
//! // ... run the application ...
//!
//! guard.shutdown();
//! ```
//!
//! # Environment
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: default collector endpoint
//! - `RUST_LOG`: log filter directives, overriding the configured level

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// How often metrics are pushed to the collector
pub const METRIC_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Telemetry settings
///
/// Without an endpoint only local logging is set up.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub service_version: String,
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`
    pub otlp_endpoint: Option<String>,
    /// Filter used when `RUST_LOG` is not set
    pub log_level: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "jrpc".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        }
    }
}

impl TelemetryConfig {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Keep logging local even if the environment names a collector
    pub fn without_export(mut self) -> Self {
        self.otlp_endpoint = None;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    fn resource(&self) -> Resource {
        Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Providers installed by [`init_telemetry`]
///
/// Dropping the guard leaves the providers running; call
/// [`TelemetryGuard::shutdown`] to flush buffered spans and metrics.
#[derive(Default)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
    meter_provider: Option<SdkMeterProvider>,
}

impl TelemetryGuard {
    /// Whether spans and metrics are being exported
    pub fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some() || self.meter_provider.is_some()
    }

    pub fn shutdown(self) {
        if let Some(provider) = self.tracer_provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "tracer provider shutdown failed");
            }
        }
        if let Some(provider) = self.meter_provider {
            if let Err(e) = provider.shutdown() {
                tracing::warn!(error = %e, "meter provider shutdown failed");
            }
        }
    }
}

/// Install the global tracing subscriber and, optionally, OTLP exporters
///
/// Fails if a global subscriber is already installed, if the log filter
/// does not parse, or if an exporter cannot be built.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, BoxError> {
    let env_filter =
        EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&config.log_level))?;

    let mut guard = TelemetryGuard::default();
    let mut otel_layer = None;

    if let Some(endpoint) = &config.otlp_endpoint {
        let tracer_provider = build_tracer_provider(&config, endpoint)?;
        let meter_provider = build_meter_provider(&config, endpoint)?;

        use opentelemetry::trace::TracerProvider as _;
        let tracer = tracer_provider.tracer(config.service_name.clone());
        otel_layer = Some(tracing_opentelemetry::layer().with_tracer(tracer));

        global::set_tracer_provider(tracer_provider.clone());
        global::set_meter_provider(meter_provider.clone());
        guard.tracer_provider = Some(tracer_provider);
        guard.meter_provider = Some(meter_provider);
    }

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .json();

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = config.otlp_endpoint.as_deref().unwrap_or("none"),
        "telemetry initialized"
    );

    Ok(guard)
}

fn build_tracer_provider(config: &TelemetryConfig, endpoint: &str) -> Result<SdkTracerProvider, BoxError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .build())
}

fn build_meter_provider(config: &TelemetryConfig, endpoint: &str) -> Result<SdkMeterProvider, BoxError> {
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRIC_EXPORT_INTERVAL)
        .build();

    Ok(SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = TelemetryConfig::new("peer-a")
            .with_endpoint("http://collector:4317")
            .with_log_level("debug")
            .with_version("1.2.3");

        assert_eq!(config.service_name, "peer-a");
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://collector:4317"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.service_version, "1.2.3");

        assert_eq!(config.without_export().otlp_endpoint, None);
    }

    #[test]
    fn test_local_only_init() {
        let config = TelemetryConfig::new("local").without_export();
        // Another test binary may already own the global subscriber.
        if let Ok(guard) = init_telemetry(config) {
            assert!(!guard.is_exporting());
            guard.shutdown();
        }
    }
}
