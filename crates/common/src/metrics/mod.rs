//! Metrics and observability utilities
//!
//! Pipeline counters and latency histograms recorded through the `metrics`
//! facade. Nothing is exported unless the host process installs a recorder.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};

/// Metrics prefix for all Outlook RAG metrics
pub const METRICS_PREFIX: &str = "outlook";

/// Register all metric descriptions
pub fn register_metrics() {
    // Ingestion metrics
    describe_counter!(
        format!("{}_pages_read_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages produced by page sources"
    );

    describe_counter!(
        format!("{}_sections_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total sections closed by the segmenter"
    );

    describe_counter!(
        format!("{}_orphan_lines_total", METRICS_PREFIX),
        Unit::Count,
        "Lines dropped because they appeared before a document's first heading"
    );

    describe_counter!(
        format!("{}_chunks_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total chunks emitted by the chunker"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding request latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    // Search metrics
    describe_counter!(
        format!("{}_search_queries_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of search queries"
    );

    describe_histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Search latency in seconds, query embedding included"
    );

    tracing::debug!("Metrics registered");
}

/// Helper to record segmentation and chunking output for one document set
pub fn record_ingestion(pages: usize, sections: usize, orphan_lines: usize, chunks: usize) {
    counter!(format!("{}_pages_read_total", METRICS_PREFIX)).increment(pages as u64);
    counter!(format!("{}_sections_created_total", METRICS_PREFIX)).increment(sections as u64);
    counter!(format!("{}_orphan_lines_total", METRICS_PREFIX)).increment(orphan_lines as u64);
    counter!(format!("{}_chunks_created_total", METRICS_PREFIX)).increment(chunks as u64);
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, batch_size: usize, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(batch_size as u64);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    let name = if hit { "cache_hits_total" } else { "cache_misses_total" };
    counter!(
        format!("{}_{}", METRICS_PREFIX, name),
        "cache" => cache_name.to_string()
    )
    .increment(1);
}

/// Helper to record search metrics
pub fn record_search(duration_secs: f64, candidates: usize) {
    counter!(format!("{}_search_queries_total", METRICS_PREFIX)).increment(1);

    histogram!(
        format!("{}_search_duration_seconds", METRICS_PREFIX),
        "candidates" => candidate_bucket(candidates)
    )
    .record(duration_secs);
}

/// Coarse label so the candidate-set size does not explode label cardinality
fn candidate_bucket(candidates: usize) -> &'static str {
    match candidates {
        0 => "empty",
        1..=100 => "le_100",
        101..=1000 => "le_1000",
        _ => "gt_1000",
    }
}
