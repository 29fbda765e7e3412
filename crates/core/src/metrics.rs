//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Orchestrator (cycles, request outcomes)
//! - Anti-fraud gate (rejections by rule)
//! - Purchase strategies (attempts by strategy and outcome)
//! - Instrument issuance and freezing

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts};

/// Acquisition cycles run.
pub static ACQUISITION_CYCLES: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("encore_acquisition_cycles_total", "Total acquisition cycles").unwrap()
});

/// Acquisition cycle duration in seconds.
pub static CYCLE_DURATION: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "encore_cycle_duration_seconds",
            "Duration of one acquisition cycle",
        )
        .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .unwrap()
});

/// Acquisition request outcomes.
pub static REQUEST_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encore_request_outcomes_total",
            "Acquisition request outcomes",
        ),
        &["outcome"], // "completed", "failed", "manual_handoff", "skipped"
    )
    .unwrap()
});

/// Fraud gate rejections by rule.
pub static FRAUD_REJECTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("encore_fraud_rejections_total", "Fraud gate rejections"),
        &["rule"], // "blocklist", "price_ceiling", "malformed_url"
    )
    .unwrap()
});

/// Strategy attempts by strategy and outcome.
pub static STRATEGY_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "encore_strategy_attempts_total",
            "Purchase strategy attempts",
        ),
        &["strategy", "outcome"], // outcome: "purchased", "failed", "handoff"
    )
    .unwrap()
});

/// Targets that passed the gate without being allowlisted.
pub static UNVETTED_TARGETS: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encore_unvetted_targets_total",
        "Accepted purchase targets whose host is not allowlisted",
    )
    .unwrap()
});

/// Payment instruments issued.
pub static INSTRUMENTS_ISSUED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encore_instruments_issued_total",
        "Payment instruments issued",
    )
    .unwrap()
});

/// Payment instruments frozen.
pub static INSTRUMENTS_FROZEN: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encore_instruments_frozen_total",
        "Payment instruments frozen",
    )
    .unwrap()
});

/// Inventory units materialized.
pub static INVENTORY_UNITS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "encore_inventory_units_created_total",
        "Inventory units materialized",
    )
    .unwrap()
});

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ACQUISITION_CYCLES.clone()),
        Box::new(CYCLE_DURATION.clone()),
        Box::new(REQUEST_OUTCOMES.clone()),
        Box::new(FRAUD_REJECTIONS.clone()),
        Box::new(STRATEGY_ATTEMPTS.clone()),
        Box::new(UNVETTED_TARGETS.clone()),
        Box::new(INSTRUMENTS_ISSUED.clone()),
        Box::new(INSTRUMENTS_FROZEN.clone()),
        Box::new(INVENTORY_UNITS_CREATED.clone()),
    ]
}
