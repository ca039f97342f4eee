//! Metrics emitted through the `metrics` facade.
//!
//! Nothing is exported unless the embedding binary installs a recorder.

use std::time::Duration;

use metrics::{counter, histogram};

/// Record one finished connector search.
pub fn record_search(connector: &str, elapsed: Duration, succeeded: bool) {
    counter!("connector_searches_total", "connector" => connector.to_string()).increment(1);
    if !succeeded {
        counter!("connector_search_failures_total", "connector" => connector.to_string()).increment(1);
    }
    histogram!("connector_search_duration_ms", "connector" => connector.to_string())
        .record(elapsed.as_secs_f64() * 1000.0);
}

/// Record a lookup in a named cache (`<cache>_cache_hits_total` / `_misses_total`).
pub fn record_cache_lookup(cache: &str, hit: bool) {
    let name = if hit {
        format!("{}_cache_hits_total", cache)
    } else {
        format!("{}_cache_misses_total", cache)
    };
    counter!(name).increment(1);
}
