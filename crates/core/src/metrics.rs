//! Prometheus metrics for a fleet run.
//!
//! This module provides metrics for:
//! - Device calls (counts by operation and status class, latency)
//! - Transport failures
//! - Fleet shape (devices, devices with work, work items)

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

use crate::report::Outcome;

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// Device Call Metrics
// =============================================================================

/// Device calls total by operation and status class.
pub static DEVICE_CALLS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("tablethive_device_calls_total", "Total device calls"),
        &["operation", "status"], // status: "2xx", "4xx", "none", ...
    )
    .unwrap()
});

/// Device call duration in seconds.
pub static DEVICE_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "tablethive_device_call_duration_seconds",
            "Time from send until response headers",
        )
        .buckets(vec![
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
        ]),
        &["operation"],
    )
    .unwrap()
});

/// Calls that never received a response.
pub static TRANSPORT_FAILURES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "tablethive_transport_failures_total",
            "Device calls that failed before any response",
        ),
        &["operation"],
    )
    .unwrap()
});

// =============================================================================
// Fleet Metrics
// =============================================================================

/// Devices in the current run.
pub static FLEET_DEVICES: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new("tablethive_fleet_devices", "Devices in the current run").unwrap()
});

/// Devices that received at least one work item.
pub static DEVICES_WITH_WORK: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tablethive_devices_with_work",
        "Devices with at least one work item after extraction",
    )
    .unwrap()
});

/// Work items scheduled for status updates.
pub static WORK_ITEMS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "tablethive_work_items",
        "Work items scheduled for status updates",
    )
    .unwrap()
});

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(DEVICE_CALLS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(DEVICE_CALL_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(TRANSPORT_FAILURES_TOTAL.clone()))
        .unwrap();
    registry.register(Box::new(FLEET_DEVICES.clone())).unwrap();
    registry.register(Box::new(DEVICES_WITH_WORK.clone())).unwrap();
    registry.register(Box::new(WORK_ITEMS.clone())).unwrap();
}

/// Record one outcome.
pub fn observe_outcome(outcome: &Outcome) {
    let operation = outcome.kind.as_str();
    DEVICE_CALLS_TOTAL
        .with_label_values(&[operation, outcome.status_class()])
        .inc();
    if outcome.is_transport_failure() {
        TRANSPORT_FAILURES_TOTAL
            .with_label_values(&[operation])
            .inc();
    } else {
        DEVICE_CALL_DURATION
            .with_label_values(&[operation])
            .observe(outcome.elapsed_seconds);
    }
}

/// Encode all metrics in Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}
