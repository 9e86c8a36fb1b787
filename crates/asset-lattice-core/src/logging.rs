//! Logging facilities for Asset Lattice.
//!
//! Asset Lattice uses the `tracing` crate for instrumentation. To see logs,
//! install a tracing subscriber in your application:
//!
//! ```ignore
//! tracing_subscriber::fmt()
//!     .with_env_filter("asset_lattice::cache=debug")
//!     .init();
//! ```
//!
//! The constants in [`targets`] and [`span_names`] name the subsystems so
//! filters can be written once and shared.

/// Span names used throughout Asset Lattice for tracing.
pub mod span_names {
    /// Full in-memory resort of the item tree.
    pub const SORT: &str = "asset_lattice::sort";
    /// One lazy-fetch round trip.
    pub const FETCH: &str = "asset_lattice::fetch";
    /// Re-chunking of a complete cache set under a new sort order.
    pub const CACHE_RESORT: &str = "asset_lattice::cache_resort";
}

/// Target names for log filtering.
pub mod targets {
    /// Item store: structural mutation, edits, check state.
    pub const STORE: &str = "asset_lattice::store";
    /// Result cache: hits, misses, promotions.
    pub const CACHE: &str = "asset_lattice::cache";
    /// Data source binding and backend round trips.
    pub const SOURCE: &str = "asset_lattice::source";
    /// Performance spans.
    pub const PERF: &str = "asset_lattice::perf";
    /// Signal/slot system.
    pub const SIGNAL: &str = "asset_lattice_core::signal";
}

/// A guard that keeps a tracing span entered until it is dropped.
///
/// Used to measure the duration of sorts, fetches and cache resorts.
#[derive(Debug)]
pub struct PerfSpan {
    #[allow(dead_code)]
    span: tracing::span::EnteredSpan,
}

impl PerfSpan {
    /// Create and enter a new performance span.
    pub fn new(name: &'static str) -> Self {
        let span = tracing::info_span!(target: "asset_lattice::perf", "perf", operation = name);
        Self {
            span: span.entered(),
        }
    }
}

/// Trace-level event on the store target.
#[macro_export]
macro_rules! store_trace {
    ($($arg:tt)*) => {
        tracing::trace!(target: "asset_lattice::store", $($arg)*)
    };
}

/// Debug-level event on the store target.
#[macro_export]
macro_rules! store_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "asset_lattice::store", $($arg)*)
    };
}

/// Warn-level event on the store target.
#[macro_export]
macro_rules! store_warn {
    ($($arg:tt)*) => {
        tracing::warn!(target: "asset_lattice::store", $($arg)*)
    };
}

/// Debug-level event on the cache target.
#[macro_export]
macro_rules! cache_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "asset_lattice::cache", $($arg)*)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perf_span_under_subscriber() {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_test_writer()
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let _span = PerfSpan::new(span_names::SORT);
            store_debug!(rows = 3, "sorted");
            cache_debug!("cache hit");
        });
    }

    #[test]
    fn test_targets_are_namespaced() {
        for target in [targets::STORE, targets::CACHE, targets::SOURCE, targets::PERF] {
            assert!(target.starts_with("asset_lattice::"));
        }
    }
}
