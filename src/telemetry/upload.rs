//! Upload span helpers.
//!
//! Provides span creation and outcome recording for uploads flowing
//! through the bounded runner.

use tracing::Span;
use uuid::Uuid;

/// Start a span for one upload.
///
/// The outcome fields are declared empty and filled by
/// [`record_upload_outcome`].
pub fn start_upload_span(name: &str, upload_id: &Uuid, size: usize) -> Span {
    tracing::info_span!(
        "upload.execute",
        "upload.name" = name,
        "upload.id" = %upload_id,
        "upload.size" = size,
        "upload.outcome" = tracing::field::Empty,
        "upload.timed_out" = tracing::field::Empty,
    )
}

/// Record what the waiting caller observed.
///
/// Emits a tracing `info` event scoped to the given span.
pub fn record_upload_outcome(span: &Span, outcome: &str, timed_out: bool) {
    span.record("upload.outcome", outcome);
    span.record("upload.timed_out", timed_out);
    span.in_scope(|| {
        tracing::info!(outcome = outcome, timed_out = timed_out, "upload_outcome");
    });
}
