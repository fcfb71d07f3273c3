//! Metrics definitions for the indexer.
//!
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "blocks_indexed_total",
        "Total number of blocks successfully indexed"
    );
    describe_histogram!(
        "block_processing_duration_seconds",
        "Time taken to process a block in seconds"
    );
    describe_counter!(
        "ledger_entries_total",
        "Total number of ledger entries recorded, by kind"
    );
    describe_counter!(
        "ledger_duplicates_skipped_total",
        "Ledger entries skipped because their id was already recorded"
    );
    describe_counter!(
        "ledger_suppressed_total",
        "Extrinsic-derived entries suppressed because an event already covered them"
    );
    describe_counter!(
        "ledger_clamp_events_total",
        "Number of times a running total was clamped at zero"
    );
    describe_counter!(
        "ledger_dropped_entries_total",
        "Entries dropped before recording, by reason"
    );
    describe_counter!(
        "schema_errors_total",
        "Records whose schema could not be resolved or normalized"
    );
}

/// Record a successfully indexed block.
pub fn record_block_indexed() {
    counter!("blocks_indexed_total").increment(1);
}

/// Record block processing duration.
pub fn record_block_processing_duration(duration_secs: f64) {
    histogram!("block_processing_duration_seconds").record(duration_secs);
}

/// Record a ledger entry of the given kind (`reward`, `slash`, ...).
pub fn record_entry(kind: &'static str) {
    counter!("ledger_entries_total", "kind" => kind).increment(1);
}

/// Record an entry skipped on replay.
pub fn record_duplicate(kind: &'static str) {
    counter!("ledger_duplicates_skipped_total", "kind" => kind).increment(1);
}

/// Record an extrinsic-derived entry suppressed by the idempotency guard.
pub fn record_suppressed(kind: &'static str) {
    counter!("ledger_suppressed_total", "kind" => kind).increment(1);
}

/// Record a running total clamped at zero.
///
/// # Arguments
/// * `kind` - The entry kind that caused the clamp (`slash` or `bond`)
pub fn record_clamp(kind: &'static str) {
    counter!("ledger_clamp_events_total", "kind" => kind).increment(1);
}

/// Record an entry dropped before recording.
pub fn record_dropped(reason: &'static str) {
    counter!("ledger_dropped_entries_total", "reason" => reason).increment(1);
}

/// Record a schema resolution or normalization failure.
pub fn record_schema_error(name: &str) {
    counter!("schema_errors_total", "name" => name.to_string()).increment(1);
}

/// A timer that automatically records duration when dropped.
pub struct ProcessingTimer {
    start: Instant,
}

impl ProcessingTimer {
    /// Start a new processing timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_block_processing_duration(duration);
    }
}
