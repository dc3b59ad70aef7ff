//! # Telemetry Features
//!
//! Console logging through `tracing-subscriber` is always on. OpenTelemetry
//! export is opt-in through cargo features.
//!
//! ## Feature matrix
//!
//! - `traces`: Exports `tracing` spans through an OpenTelemetry tracer.
//! - `metrics`: Records registry counters through an OpenTelemetry meter.
//! - `stdout`: Prints exported spans/metrics to stdout.
//!
//! ## Feature constraints
//!
//! - `stdout` requires at least one of `traces` or `metrics`.
//!
//! ## Log filtering
//!
//! The filter comes from `RUST_LOG` and defaults to `info`, e.g.
//!
//! ```bash
//! RUST_LOG=prodinfo_server=debug,tonic=info cargo run --features traces,stdout
//! ```
//!
//! ## Metrics
//!
//! - `products_created`: successful `addProduct` calls
//! - `product_lookups`: `getProduct` calls
//! - `product_not_found`: `getProduct` calls for unknown ids
//! - `rpc_errors`: failed calls, labelled by `method`
//!
//! The recording helpers compile to no-ops when `metrics` is disabled.

#[cfg(all(feature = "stdout", not(any(feature = "traces", feature = "metrics"))))]
compile_error!("The 'stdout' feature requires at least one of 'traces' or 'metrics' to be enabled.");

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Counter, Meter};
#[cfg(feature = "metrics")]
use opentelemetry_sdk::metrics as sdkmetrics;
#[cfg(feature = "metrics")]
use std::sync::OnceLock;

#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry::{InstrumentationScope, KeyValue};
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_sdk::Resource;
#[cfg(any(feature = "metrics", feature = "traces"))]
use opentelemetry_semantic_conventions as semvcns;

#[cfg(feature = "traces")]
use opentelemetry::trace::TracerProvider;
#[cfg(feature = "traces")]
use opentelemetry_sdk::propagation::TraceContextPropagator;
#[cfg(feature = "traces")]
use opentelemetry_sdk::trace as sdktrace;

/// Exporter handles that must outlive the server so buffered telemetry can
/// be flushed on exit.
pub struct TelemetryProviders {
    #[cfg(feature = "traces")]
    pub tracer_provider: sdktrace::SdkTracerProvider,
    #[cfg(feature = "metrics")]
    pub meter_provider: sdkmetrics::SdkMeterProvider,
}

impl TelemetryProviders {
    /// Flushes and shuts down every enabled provider.
    pub fn shutdown(self) {
        #[cfg(feature = "traces")]
        {
            if let Err(err) = self.tracer_provider.force_flush() {
                eprintln!("Error flushing traces: {:#?}", err);
            }
            if let Err(err) = self.tracer_provider.shutdown() {
                eprintln!("Error shutting down tracer: {:#?}", err);
            }
        }

        #[cfg(feature = "metrics")]
        {
            if let Err(err) = self.meter_provider.force_flush() {
                eprintln!("Error flushing metrics: {:#?}", err);
            }
            if let Err(err) = self.meter_provider.shutdown() {
                eprintln!("Error shutting down meter: {:#?}", err);
            }
        }
    }
}

pub fn init_telemetry() -> anyhow::Result<TelemetryProviders> {
    #[cfg(feature = "traces")]
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    #[cfg(feature = "traces")]
    let tracer_provider = init_tracer();

    #[cfg(feature = "metrics")]
    let meter_provider = init_metrics();

    #[cfg(any(feature = "metrics", feature = "traces"))]
    let scope = InstrumentationScope::builder("prodinfo")
        .with_version(env!("CARGO_PKG_VERSION"))
        .with_schema_url(semvcns::SCHEMA_URL)
        .build();

    // Human-readable console output; independent of the OpenTelemetry
    // `stdout` exporter.
    let registry = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_thread_ids(true)
                .with_line_number(true)
                .with_target(false)
                .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
                .with_file(true)
                .pretty(),
        );

    #[cfg(feature = "traces")]
    let registry = {
        opentelemetry::global::set_tracer_provider(tracer_provider.clone());
        registry.with(
            tracing_opentelemetry::layer()
                .with_tracer(tracer_provider.tracer_with_scope(scope.clone()))
                .with_error_records_to_exceptions(true),
        )
    };

    #[cfg(feature = "metrics")]
    let registry = {
        opentelemetry::global::set_meter_provider(meter_provider.clone());
        let meter = opentelemetry::global::meter_with_scope(scope);
        init_metric_handles(meter);

        registry.with(tracing_opentelemetry::MetricsLayer::new(
            meter_provider.clone(),
        ))
    };

    registry.try_init()?;

    Ok(TelemetryProviders {
        #[cfg(feature = "traces")]
        tracer_provider,
        #[cfg(feature = "metrics")]
        meter_provider,
    })
}

#[cfg(any(feature = "metrics", feature = "traces"))]
fn resource() -> Resource {
    Resource::builder()
        .with_service_name("prodinfo")
        .with_schema_url(
            [KeyValue::new(
                semvcns::resource::SERVICE_VERSION,
                env!("CARGO_PKG_VERSION"),
            )],
            semvcns::SCHEMA_URL,
        )
        .build()
}

#[cfg(feature = "metrics")]
fn init_metrics() -> sdkmetrics::SdkMeterProvider {
    let builder = sdkmetrics::SdkMeterProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::MetricExporter::default();
        let reader = sdkmetrics::PeriodicReader::builder(exporter)
            .with_interval(std::time::Duration::from_secs(5))
            .build();
        builder.with_reader(reader)
    };

    builder.build()
}

#[cfg(feature = "traces")]
fn init_tracer() -> sdktrace::SdkTracerProvider {
    let builder = sdktrace::SdkTracerProvider::builder().with_resource(resource());

    #[cfg(feature = "stdout")]
    let builder = {
        let exporter = opentelemetry_stdout::SpanExporter::default();
        let batch = sdktrace::BatchSpanProcessor::builder(exporter)
            .with_batch_config(
                sdktrace::BatchConfigBuilder::default()
                    .with_scheduled_delay(std::time::Duration::from_secs(5))
                    .with_max_queue_size(2048)
                    .build(),
            )
            .build();
        builder.with_span_processor(batch)
    };

    builder.build()
}

#[cfg(feature = "metrics")]
static PRODUCTS_CREATED: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PRODUCT_LOOKUPS: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static PRODUCT_NOT_FOUND: OnceLock<Counter<u64>> = OnceLock::new();
#[cfg(feature = "metrics")]
static RPC_ERRORS: OnceLock<Counter<u64>> = OnceLock::new();

#[cfg(feature = "metrics")]
fn init_metric_handles(meter: Meter) {
    let _ = PRODUCTS_CREATED.set(
        meter
            .u64_counter("products_created")
            .with_description("Products registered")
            .build(),
    );

    let _ = PRODUCT_LOOKUPS.set(
        meter
            .u64_counter("product_lookups")
            .with_description("Product lookups by id")
            .build(),
    );

    let _ = PRODUCT_NOT_FOUND.set(
        meter
            .u64_counter("product_not_found")
            .with_description("Lookups for unknown product ids")
            .build(),
    );

    let _ = RPC_ERRORS.set(
        meter
            .u64_counter("rpc_errors")
            .with_description("Failed ProductInfo calls")
            .build(),
    );
}

#[cfg(feature = "metrics")]
pub fn increment_products_created() {
    if let Some(counter) = PRODUCTS_CREATED.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_products_created() {}

#[cfg(feature = "metrics")]
pub fn increment_lookups() {
    if let Some(counter) = PRODUCT_LOOKUPS.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_lookups() {}

#[cfg(feature = "metrics")]
pub fn increment_not_found() {
    if let Some(counter) = PRODUCT_NOT_FOUND.get() {
        counter.add(1, &[]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_not_found() {}

#[cfg(feature = "metrics")]
pub fn increment_rpc_errors(method: &'static str) {
    if let Some(counter) = RPC_ERRORS.get() {
        counter.add(1, &[KeyValue::new("method", method)]);
    }
}

#[cfg(not(feature = "metrics"))]
pub fn increment_rpc_errors(_method: &'static str) {}
