// SPDX-FileCopyrightText: © 2025 Jamie Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! OpenTelemetry metrics and tracing export over OTLP.

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_otlp::{Protocol, WithExportConfig, WithHttpConfig};
use opentelemetry_sdk::metrics::{MeterProviderBuilder, PeriodicReader, SdkMeterProvider};
use opentelemetry_sdk::trace::{self as sdktrace, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use std::time::Duration;
use tracing_opentelemetry::OpenTelemetryLayer;

use crate::config::TelemetryConfig;

fn resource() -> Resource {
    Resource::builder_empty()
        .with_attributes([
            opentelemetry::KeyValue::new("service.name", "jamie"),
            opentelemetry::KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
        ])
        .build()
}

fn build_otlp_exporter(
    endpoint: &str,
    headers: &std::collections::HashMap<String, String>,
) -> Result<opentelemetry_otlp::MetricExporter, Box<dyn std::error::Error>> {
    let mut exporter_builder = opentelemetry_otlp::MetricExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10));

    if !headers.is_empty() {
        exporter_builder = exporter_builder.with_headers(headers.clone());
    }

    exporter_builder.build().map_err(|e| {
        tracing::error!("failed to build OTLP metrics exporter: {e}");
        e.into()
    })
}

fn build_otlp_span_exporter(
    endpoint: &str,
    headers: &std::collections::HashMap<String, String>,
) -> Result<opentelemetry_otlp::SpanExporter, Box<dyn std::error::Error>> {
    let mut exporter_builder = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_protocol(Protocol::HttpBinary)
        .with_endpoint(endpoint)
        .with_timeout(Duration::from_secs(10));

    if !headers.is_empty() {
        exporter_builder = exporter_builder.with_headers(headers.clone());
    }

    exporter_builder.build().map_err(|e| {
        tracing::error!("failed to build OTLP trace exporter: {e}");
        e.into()
    })
}

fn init_metrics_with_otlp(
    builder: MeterProviderBuilder,
    endpoint: &str,
    headers: &std::collections::HashMap<String, String>,
) -> Result<SdkMeterProvider, Box<dyn std::error::Error>> {
    let exporter = build_otlp_exporter(endpoint, headers)?;
    let reader = PeriodicReader::builder(exporter).with_interval(Duration::from_secs(5)).build();

    let provider = builder.with_reader(reader).build();
    global::set_meter_provider(provider.clone());
    tracing::info!(endpoint, "otlp metrics exporter configured");
    Ok(provider)
}

fn init_metrics_local_only(builder: MeterProviderBuilder) -> SdkMeterProvider {
    tracing::info!("no otlp endpoint configured; metrics are collected but not exported");
    let provider = builder.build();
    global::set_meter_provider(provider.clone());
    provider
}

/// Builds the global meter provider. Exports to OTLP when an endpoint is
/// configured, otherwise keeps metrics in-process only.
///
/// # Errors
/// Returns an error if the OTLP metrics exporter cannot be constructed.
pub fn init_metrics(config: &TelemetryConfig) -> Result<SdkMeterProvider, Box<dyn std::error::Error>> {
    let builder = SdkMeterProvider::builder().with_resource(resource());

    if let Some(endpoint) = &config.otlp_endpoint {
        init_metrics_with_otlp(builder, endpoint, &config.otlp_headers)
    } else {
        Ok(init_metrics_local_only(builder))
    }
}

/// Builds a `tracing` layer that forwards spans to an OTLP trace collector.
///
/// # Errors
/// Returns an error if `otlp_traces_endpoint` is unset or the OTLP span
/// exporter cannot be constructed.
pub fn init_tracing_with_otlp<S>(
    config: &TelemetryConfig,
) -> Result<OpenTelemetryLayer<S, sdktrace::Tracer>, Box<dyn std::error::Error>>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    let endpoint = config
        .otlp_traces_endpoint
        .as_ref()
        .ok_or_else(|| "tracing is enabled but no otlp_traces_endpoint is configured".to_string())?;

    let exporter = build_otlp_span_exporter(endpoint, &config.otlp_headers)?;
    let provider =
        SdkTracerProvider::builder().with_batch_exporter(exporter).with_resource(resource()).build();

    let tracer = provider.tracer("jamie");
    global::set_tracer_provider(provider);

    Ok(tracing_opentelemetry::layer().with_tracer(tracer))
}
