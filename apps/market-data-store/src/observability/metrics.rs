//! Storage metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the host
//! installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

// ============================================================================
// Container Writes
// ============================================================================

/// Record a container write.
///
/// # Arguments
///
/// * `outcome` - Write outcome or error reason (e.g., "created", "CORRUPT_CONTAINER")
/// * `lines` - Number of lines in the written entry
/// * `elapsed` - Wall time of the write
pub fn record_container_write(outcome: &str, lines: usize, elapsed: Duration) {
    counter!(
        "store_container_writes_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    if matches!(outcome, "created" | "entry_added" | "entry_replaced") {
        counter!("store_entries_written_total").increment(1);
        counter!("store_lines_written_total").increment(lines as u64);
    }

    histogram!("store_write_duration_seconds").record(elapsed.as_secs_f64());
}

// ============================================================================
// Container Reads
// ============================================================================

/// Record a container read.
///
/// # Arguments
///
/// * `outcome` - "ok" or the error reason
pub fn record_container_read(outcome: &str) {
    counter!(
        "store_container_reads_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);
}
