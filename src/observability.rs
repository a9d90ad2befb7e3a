use std::net::SocketAddr;

// ── Cache ───────────────────────────────────────────────────────

/// Counter: cache reads that returned a fresh value. Labels: cache.
pub const CACHE_HITS_TOTAL: &str = "gearlist_cache_hits_total";

/// Counter: cache reads that found nothing or a stale value. Labels: cache.
pub const CACHE_MISSES_TOTAL: &str = "gearlist_cache_misses_total";

// ── Tree ────────────────────────────────────────────────────────

/// Histogram: source fetch + tree build duration in seconds.
pub const TREE_BUILD_DURATION_SECONDS: &str = "gearlist_tree_build_duration_seconds";

/// Counter: records skipped by the builder. Labels: reason.
pub const TREE_ITEMS_DROPPED_TOTAL: &str = "gearlist_tree_items_dropped_total";

/// Counter: builds that fell back to a stale or empty tree.
pub const TREE_FALLBACKS_TOTAL: &str = "gearlist_tree_fallbacks_total";

// ── Availability ────────────────────────────────────────────────

/// Counter: single-item availability checks. Labels: outcome.
pub const AVAILABILITY_CHECKS_TOTAL: &str = "gearlist_availability_checks_total";

/// Histogram: batch conflict fetch + tree walk duration in seconds.
pub const ANNOTATE_DURATION_SECONDS: &str = "gearlist_annotate_duration_seconds";

// ── Source ──────────────────────────────────────────────────────

/// Counter: failed record-source queries. Labels: op.
pub const SOURCE_ERRORS_TOTAL: &str = "gearlist_source_errors_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
