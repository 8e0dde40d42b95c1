//! Telemetry setup for cachicamo.
//!
//! Log output always goes to a local fmt layer. When an OTLP endpoint is
//! configured, spans, metrics and log records are exported there as well,
//! and the upload instruments get views sized to the configured deadline.

pub mod metrics;
pub mod upload;
pub mod usage;

use std::time::Duration;

use opentelemetry::KeyValue;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::{Aggregation, Instrument, SdkMeterProvider, Stream};
use opentelemetry_sdk::trace::SdkTracerProvider;

use crate::config::Config;
use crate::error::{Error, Result};

pub const SERVICE_NAME: &str = "cachicamo";

/// Where and how much to report.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint (e.g. "http://localhost:4317"). `None` keeps
    /// everything local.
    pub endpoint: Option<String>,
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
    /// Sizes the upload wait histogram buckets.
    pub upload_deadline: Duration,
}

impl TelemetryConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            endpoint: config.otel_endpoint.clone(),
            service_name: SERVICE_NAME.to_string(),
            log_level: config.log_level.clone(),
            upload_deadline: config.upload_deadline,
        }
    }
}

/// Keeps the OTLP pipelines alive. Dropping it flushes and shuts them down.
#[must_use = "dropping the guard shuts telemetry down"]
pub struct TelemetryGuard {
    otlp: Option<OtlpPipelines>,
}

impl TelemetryGuard {
    /// Whether signals are being exported, not just logged locally.
    pub fn is_exporting(&self) -> bool {
        self.otlp.is_some()
    }

    /// Push buffered spans, metrics and logs out now. Tests use this before
    /// querying backends.
    pub fn force_flush(&self) {
        if let Some(otlp) = &self.otlp {
            let _ = otlp.tracer.force_flush();
            let _ = otlp.meter.force_flush();
            let _ = otlp.logger.force_flush();
        }
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(otlp) = self.otlp.take() {
            // Logs first so shutdown events from the other providers are not lost.
            let _ = otlp.logger.shutdown();
            let _ = otlp.meter.shutdown();
            let _ = otlp.tracer.shutdown();
        }
    }
}

struct OtlpPipelines {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

impl OtlpPipelines {
    fn build(endpoint: &str, config: &TelemetryConfig) -> Result<Self> {
        use opentelemetry_otlp::WithExportConfig as _;

        let resource = resource(config);

        let spans = opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("span", e))?;
        let tracer = SdkTracerProvider::builder()
            .with_batch_exporter(spans)
            .with_resource(resource.clone())
            .build();

        let metrics = opentelemetry_otlp::MetricExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("metric", e))?;
        let meter = SdkMeterProvider::builder()
            .with_periodic_exporter(metrics)
            .with_resource(resource.clone())
            .with_view(upload_views(config.upload_deadline))
            .build();

        let logs = opentelemetry_otlp::LogExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
            .map_err(|e| exporter_error("log", e))?;
        let logger = SdkLoggerProvider::builder()
            .with_batch_exporter(logs)
            .with_resource(resource)
            .build();

        Ok(Self {
            tracer,
            meter,
            logger,
        })
    }
}

/// Install the global tracing subscriber and, with an endpoint, the OTLP
/// pipelines and global meter provider.
///
/// # Errors
///
/// Fails if an OTLP exporter cannot be built or a global subscriber is
/// already set.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let local = tracing_subscriber::fmt::layer().compact();

    let Some(endpoint) = config.endpoint.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(local)
            .try_init()
            .map_err(subscriber_error)?;
        return Ok(TelemetryGuard { otlp: None });
    };

    let otlp = OtlpPipelines::build(endpoint, &config)?;
    opentelemetry::global::set_meter_provider(otlp.meter.clone());

    let spans = tracing_opentelemetry::layer().with_tracer(otlp.tracer.tracer(SERVICE_NAME));
    let logs = opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(&otlp.logger);

    tracing_subscriber::registry()
        .with(filter)
        .with(local)
        .with(spans)
        .with(logs)
        .try_init()
        .map_err(subscriber_error)?;

    Ok(TelemetryGuard { otlp: Some(otlp) })
}

fn resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes([
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            ),
            KeyValue::new(
                "cachicamo.upload.deadline_ms",
                config.upload_deadline.as_millis() as i64,
            ),
        ])
        .build()
}

/// Views for the upload instruments.
fn upload_views(
    deadline: Duration,
) -> impl Fn(&Instrument) -> Option<Stream> + Send + Sync + 'static {
    let boundaries = upload_duration_boundaries(deadline);
    move |instrument: &Instrument| match instrument.name() {
        metrics::UPLOAD_DURATION_MS => Stream::builder()
            .with_aggregation(Aggregation::ExplicitBucketHistogram {
                boundaries: boundaries.clone(),
                record_min_max: true,
            })
            .build()
            .ok(),
        metrics::UPLOAD_IN_FLIGHT => Stream::builder()
            .with_description("Upload workers alive, including ones whose caller timed out")
            .build()
            .ok(),
        _ => None,
    }
}

/// Histogram buckets as fractions of the deadline, in milliseconds.
///
/// Timed-out waits all land just past the deadline, so the `1.0..1.1`
/// bucket isolates them from slow successes.
fn upload_duration_boundaries(deadline: Duration) -> Vec<f64> {
    const FRACTIONS: [f64; 11] = [0.01, 0.05, 0.1, 0.25, 0.5, 0.75, 0.9, 1.0, 1.1, 1.5, 2.0];
    let deadline_ms = deadline.max(Duration::from_millis(1)).as_secs_f64() * 1000.0;
    FRACTIONS.iter().map(|f| f * deadline_ms).collect()
}

fn exporter_error(signal: &str, e: impl std::fmt::Display) -> Error {
    Error::Other(format!("failed to create OTLP {signal} exporter: {e}"))
}

fn subscriber_error(e: impl std::fmt::Display) -> Error {
    Error::Other(format!("failed to init tracing subscriber: {e}"))
}
