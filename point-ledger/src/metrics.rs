//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `point_ledger_grants_total` - Credit entries created
//! - `point_ledger_spends_total` - Debit entries created by callers
//! - `point_ledger_reversals_total` - Entries deleted by reversal
//! - `point_ledger_forfeited_points_total` - Points swept as expired
//! - `point_ledger_op_duration_seconds` - Operation latency histogram
//!
//! Collectors are registered against a per-ledger registry rather than the
//! process-wide default, so tests can build any number of instances.

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Credit entries created
    pub grants_total: IntCounter,

    /// Caller debit entries created
    pub spends_total: IntCounter,

    /// Entries deleted by reversal
    pub reversals_total: IntCounter,

    /// Points swept as expired
    pub forfeited_points_total: IntCounter,

    /// Operation latency histogram
    pub op_duration: Histogram,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let grants_total = IntCounter::with_opts(Opts::new(
            "point_ledger_grants_total",
            "Credit entries created",
        ))?;
        registry.register(Box::new(grants_total.clone()))?;

        let spends_total = IntCounter::with_opts(Opts::new(
            "point_ledger_spends_total",
            "Caller debit entries created",
        ))?;
        registry.register(Box::new(spends_total.clone()))?;

        let reversals_total = IntCounter::with_opts(Opts::new(
            "point_ledger_reversals_total",
            "Entries deleted by reversal",
        ))?;
        registry.register(Box::new(reversals_total.clone()))?;

        let forfeited_points_total = IntCounter::with_opts(Opts::new(
            "point_ledger_forfeited_points_total",
            "Points swept as expired",
        ))?;
        registry.register(Box::new(forfeited_points_total.clone()))?;

        let op_duration = Histogram::with_opts(
            HistogramOpts::new(
                "point_ledger_op_duration_seconds",
                "Operation latency histogram",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0]),
        )?;
        registry.register(Box::new(op_duration.clone()))?;

        Ok(Self {
            grants_total,
            spends_total,
            reversals_total,
            forfeited_points_total,
            op_duration,
            registry,
        })
    }

    /// Record a completed grant or spend
    pub fn record_entry(&self, delta: i64) {
        if delta > 0 {
            self.grants_total.inc();
        } else {
            self.spends_total.inc();
        }
    }

    /// Record a completed reversal
    pub fn record_reversal(&self) {
        self.reversals_total.inc();
    }

    /// Record swept points
    pub fn record_forfeited(&self, points: i64) {
        if points > 0 {
            self.forfeited_points_total.inc_by(points as u64);
        }
    }

    /// Record operation duration
    pub fn record_op_duration(&self, duration_seconds: f64) {
        self.op_duration.observe(duration_seconds);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.grants_total.get(), 0);
        assert_eq!(metrics.spends_total.get(), 0);
    }

    #[test]
    fn test_record_entry_by_sign() {
        let metrics = Metrics::new().unwrap();
        metrics.record_entry(100);
        metrics.record_entry(-25);
        metrics.record_entry(50);

        assert_eq!(metrics.grants_total.get(), 2);
        assert_eq!(metrics.spends_total.get(), 1);
    }

    #[test]
    fn test_record_forfeited() {
        let metrics = Metrics::new().unwrap();
        metrics.record_forfeited(7);
        metrics.record_forfeited(0);
        assert_eq!(metrics.forfeited_points_total.get(), 7);
    }

    #[test]
    fn test_independent_registries() {
        // Two ledgers in one process must not collide on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_reversal();
        assert_eq!(a.reversals_total.get(), 1);
        assert_eq!(b.reversals_total.get(), 0);
    }
}
