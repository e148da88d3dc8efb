use std::time::Duration;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{KeyValue, global};
use opentelemetry_appender_tracing::layer::OpenTelemetryTracingBridge;
use opentelemetry_otlp::{self, Protocol, WithExportConfig};
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::logs::SdkLoggerProvider;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::util::env::Var;
use crate::var;

pub type Result<T> = core::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;

const DEFAULT_DIRECTIVES: &str = "challenge_server=debug,tower_http=debug,axum=debug,sqlx=info,info";

#[derive(Debug, Clone)]
struct Providers {
    logger: SdkLoggerProvider,
    tracer: SdkTracerProvider,
    meter: SdkMeterProvider,
}

/// Tracing subscriber setup. With no `OTEL_EXPORTER_OTLP_ENDPOINT` configured, only the stdout
/// formatter is installed.
#[derive(Debug, Clone)]
pub struct Telemetry {
    pub tracer_name: &'static str,
    pub collector_url: Option<&'static str>,
    providers: Option<Providers>,
}

impl Telemetry {
    pub async fn new() -> Result<Telemetry> {
        let endpoint = var!(Var::OtelExporterEndpoint).await?;
        let tracer_name = var!(Var::ApiTracerName).await?;
        let service_name = var!(Var::ApiServiceName).await?;

        if endpoint.is_empty() {
            return Ok(Self {
                tracer_name,
                collector_url: None,
                providers: None,
            });
        }

        let base_resource = base_attrs(service_name, env!("CARGO_PKG_VERSION"));
        let providers = Providers {
            logger: build_logger_provider(endpoint, base_resource.clone())?,
            tracer: build_tracer_provider(endpoint, base_resource.clone())?,
            meter: build_meter_provider(endpoint, base_resource)?,
        };

        Ok(Self {
            tracer_name,
            collector_url: Some(endpoint),
            providers: Some(providers),
        })
    }

    pub fn register(self) -> Self {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true);

        // each OTLP layer is `None` when export is disabled
        let otel_trace = self.providers.as_ref().map(|p| {
            global::set_tracer_provider(p.tracer.clone());
            tracing_opentelemetry::layer().with_tracer(p.tracer.tracer(self.tracer_name))
        });
        let otel_logs = self
            .providers
            .as_ref()
            .map(|p| OpenTelemetryTracingBridge::new(&p.logger));
        let otel_metrics = self
            .providers
            .as_ref()
            .map(|p| tracing_opentelemetry::MetricsLayer::new(p.meter.clone()));

        tracing_subscriber::registry()
            .with(otel_trace)
            .with(otel_logs)
            .with(otel_metrics)
            .with(filter)
            .with(fmt_layer)
            .init();

        if let Some(url) = self.collector_url {
            tracing::info!(collector = url, "otlp export enabled");
        }

        self
    }

    pub fn shutdown(self) {
        let Some(p) = self.providers else {
            return;
        };

        if let Err(e) = p.meter.shutdown() {
            eprintln!("error during metering shutdown: {e:?}");
        }

        if let Err(e) = p.logger.shutdown() {
            eprintln!("error during logging shutdown: {e:?}");
        }

        if let Err(e) = p.tracer.shutdown() {
            eprintln!("error during tracing shutdown: {e:?}");
        }
    }
}

fn build_logger_provider(collector_url: &str, base_resource: Resource) -> Result<SdkLoggerProvider> {
    let exporter = opentelemetry_otlp::LogExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkLoggerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_tracer_provider(collector_url: &str, base_resource: Resource) -> Result<SdkTracerProvider> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn build_meter_provider(collector_url: &str, base_resource: Resource) -> Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_protocol(Protocol::Grpc)
        .with_endpoint(collector_url)
        .with_timeout(Duration::from_secs(5))
        .build()?;

    Ok(SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .with_resource(base_resource)
        .build())
}

fn base_attrs(name: &'static str, version: &'static str) -> Resource {
    Resource::builder()
        .with_attributes([
            KeyValue::new("service.name", name),
            KeyValue::new("service.version", version),
        ])
        .build()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_register_without_collector() {
        let telemetry = Telemetry {
            tracer_name: "challenge-server-tracer",
            collector_url: None,
            providers: None,
        }
        .register();

        tracing::info!("stdout only");
        assert!(telemetry.providers.is_none());
        telemetry.shutdown();
    }
}
