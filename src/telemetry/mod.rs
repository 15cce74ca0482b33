//! Logging, tracing, and metrics setup.
//!
//! Every binary mode installs one `tracing` subscriber. Without an OTLP
//! endpoint it only writes to stderr. With one, spans, metrics, and log
//! events are also exported over gRPC, and the global meter provider is
//! replaced so [`metrics`] instruments start reporting.

pub mod metrics;
pub mod task;

use crate::config::Config;
use crate::error::{Error, Result};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;

/// Configuration for telemetry initialization.
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint (e.g. "http://localhost:4317"). `None` means stderr only.
    pub endpoint: Option<String>,
    /// Reported as `service.name`; also the tracer name.
    pub service_name: String,
    /// Filter directive used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl TelemetryConfig {
    pub fn from_config(config: &Config, service_name: impl Into<String>) -> Self {
        Self {
            endpoint: config.otel_endpoint.clone(),
            service_name: service_name.into(),
            log_level: config.log_level.clone(),
        }
    }
}

/// The three OTel pipelines, present only when exporting.
struct Exporters {
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
    logger: SdkLoggerProvider,
}

/// Keeps the exporters alive. Flushes and shuts them down on drop, so hold
/// it until the process is about to exit.
pub struct TelemetryGuard {
    exporters: Option<Exporters>,
}

impl TelemetryGuard {
    /// Push any buffered spans, metrics, and logs out now.
    pub fn force_flush(&self) {
        if let Some(ref ex) = self.exporters {
            let _ = ex.tracer.force_flush();
            let _ = ex.meter.force_flush();
            let _ = ex.logger.force_flush();
        }
    }

    pub fn is_exporting(&self) -> bool {
        self.exporters.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        // Logs first: shutting down the tracer can still emit log records.
        if let Some(ex) = self.exporters.take() {
            let _ = ex.logger.shutdown();
            let _ = ex.meter.shutdown();
            let _ = ex.tracer.shutdown();
        }
    }
}

fn build_exporters(endpoint: &str, service_name: &str) -> Result<Exporters> {
    use opentelemetry_otlp::WithExportConfig as _;

    let resource = Resource::builder()
        .with_service_name(service_name.to_string())
        .build();

    let spans = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP span exporter: {e}")))?;
    let tracer = SdkTracerProvider::builder()
        .with_batch_exporter(spans)
        .with_resource(resource.clone())
        .build();

    let metrics = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP metric exporter: {e}")))?;
    let meter = SdkMeterProvider::builder()
        .with_periodic_exporter(metrics)
        .with_resource(resource.clone())
        .build();

    let logs = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()
        .map_err(|e| Error::Other(format!("failed to create OTLP log exporter: {e}")))?;
    let logger = SdkLoggerProvider::builder()
        .with_batch_exporter(logs)
        .with_resource(resource)
        .build();

    Ok(Exporters {
        tracer,
        meter,
        logger,
    })
}

/// Install the global subscriber.
///
/// # Errors
///
/// Fails if an OTLP exporter cannot be built or a global subscriber is
/// already installed (common in tests; callers there may ignore it).
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard> {
    use opentelemetry::trace::TracerProvider as _;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt as _;
    use tracing_subscriber::util::SubscriberInitExt as _;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let exporters = match config.endpoint.as_deref() {
        Some(endpoint) => Some(build_exporters(endpoint, &config.service_name)?),
        None => None,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match &exporters {
        Some(ex) => {
            opentelemetry::global::set_meter_provider(ex.meter.clone());
            let tracer = ex.tracer.tracer(config.service_name.clone());
            registry
                .with(tracing_subscriber::fmt::layer().compact())
                .with(tracing_opentelemetry::layer().with_tracer(tracer))
                .with(
                    opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge::new(
                        &ex.logger,
                    ),
                )
                .try_init()
        }
        None => registry.with(tracing_subscriber::fmt::layer()).try_init(),
    };
    installed.map_err(|e| Error::Other(format!("failed to init tracing subscriber: {e}")))?;

    Ok(TelemetryGuard { exporters })
}
