//! Metric instrument factories for cachicamo.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! All instruments are created lazily from the `"cachicamo"` meter.

use opentelemetry::metrics::{Counter, Histogram, Meter, UpDownCounter};

pub const UPLOAD_OUTCOMES: &str = "cachicamo.upload.outcomes";
pub const UPLOAD_IN_FLIGHT: &str = "cachicamo.upload.in_flight";
pub const UPLOAD_DURATION_MS: &str = "cachicamo.upload.duration_ms";
pub const VISITOR_OPERATIONS: &str = "cachicamo.visitors.operations";

/// Returns the shared meter for cachicamo instruments.
fn meter() -> Meter {
    opentelemetry::global::meter(super::SERVICE_NAME)
}

/// Counter: what upload callers observed.
/// Labels: `outcome` ("saved" | "save_failed" | "timed_out").
pub fn upload_outcomes() -> Counter<u64> {
    meter()
        .u64_counter(UPLOAD_OUTCOMES)
        .with_description("Number of uploads by observed outcome")
        .build()
}

/// Up/down counter: upload workers still running, including ones whose
/// caller already timed out.
pub fn upload_in_flight() -> UpDownCounter<i64> {
    meter()
        .i64_up_down_counter(UPLOAD_IN_FLIGHT)
        .with_description("Upload workers currently alive")
        .build()
}

/// Histogram: time the caller waited, in milliseconds.
/// Labels: `outcome`.
pub fn upload_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram(UPLOAD_DURATION_MS)
        .with_description("Upload wait duration in milliseconds")
        .with_unit("ms")
        .build()
}

/// Counter: visitor counter operations.
/// Labels: `operation` ("add" | "subtract"), `result` ("ok" | "underflow").
pub fn visitor_operations() -> Counter<u64> {
    meter()
        .u64_counter(VISITOR_OPERATIONS)
        .with_description("Number of visitor counter operations")
        .build()
}
