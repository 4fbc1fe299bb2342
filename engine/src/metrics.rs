//! Process-wide Prometheus metrics for the engine (§2a "ambient stack / Metrics"). Grounded on
//! this codebase's `prometheus_exporter` actor: a `lazy_static` registry of gauges and counters
//! that every component updates inline, scraped by the server crate's own metrics service rather
//! than this crate opening a socket itself.

use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_gauge_vec_with_registry,
    register_int_gauge_with_registry, IntCounterVec, IntGauge, IntGaugeVec, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry =
        Registry::new_custom(Some("auction_engine".to_string()), None).unwrap();
    pub static ref ACTIVE_AUCTIONS: IntGauge = register_int_gauge_with_registry!(
        "active_auctions",
        "Number of auctions with a running coordinator",
        REGISTRY
    )
    .unwrap();
    pub static ref COORDINATOR_INBOX_DEPTH: IntGaugeVec = register_int_gauge_vec_with_registry!(
        "coordinator_inbox_depth",
        "Commands waiting in a per-auction coordinator's inbox",
        &["auction_id"],
        REGISTRY
    )
    .unwrap();
    pub static ref BIDS_ACCEPTED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "bids_accepted_total",
        "Bids accepted, per auction",
        &["auction_id"],
        REGISTRY
    )
    .unwrap();
    pub static ref BIDS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "bids_rejected_total",
        "Bids rejected, per auction and reason",
        &["auction_id", "reason"],
        REGISTRY
    )
    .unwrap();
}
