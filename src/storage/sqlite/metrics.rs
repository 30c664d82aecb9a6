//! Shared metrics recording for storage operations.

use std::time::Instant;

/// Records `memory_operations_total` and `memory_operation_duration_ms`.
///
/// `status` is "success" or "error".
pub fn record_operation_metrics(
    backend: &'static str,
    operation: &'static str,
    start: Instant,
    status: &'static str,
) {
    metrics::counter!(
        "memory_operations_total",
        "backend" => backend,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "memory_operation_duration_ms",
        "backend" => backend,
        "operation" => operation
    )
    .record(start.elapsed().as_secs_f64() * 1000.0);
}

/// Maps a result to the status label used by [`record_operation_metrics`].
pub const fn status_of<T, E>(result: &std::result::Result<T, E>) -> &'static str {
    if result.is_ok() { "success" } else { "error" }
}
