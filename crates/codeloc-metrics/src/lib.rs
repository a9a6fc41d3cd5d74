//! ---
//! codeloc_section: "03-logging-metrics"
//! codeloc_subsection: "module"
//! codeloc_type: "source"
//! codeloc_scope: "code"
//! codeloc_description: "Metrics collection for location handles."
//! codeloc_version: "v0.1.0"
//! codeloc_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::Result;
use prometheus::{IntCounterVec, IntGaugeVec, Opts, Registry};

/// Shared registry type used across crates.
pub type SharedRegistry = Arc<Registry>;

/// Produce a new shared registry.
pub fn new_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

/// Label values for the two supervision loops.
pub const LOOP_HEARTBEAT: &str = "heartbeat";
pub const LOOP_WATCH: &str = "watch";

/// Metrics recorded by location handles and their background loops.
#[derive(Clone, Debug)]
pub struct LocationMetrics {
    registry: SharedRegistry,
    loops_active: IntGaugeVec,
    heartbeats: IntCounterVec,
    state_events: IntCounterVec,
    subscriber_failures: IntCounterVec,
    constructions: IntCounterVec,
    cleanups: IntCounterVec,
}

impl LocationMetrics {
    pub fn new(registry: SharedRegistry) -> Result<Self> {
        let loops_active = IntGaugeVec::new(
            Opts::new(
                "codeloc_supervision_loops_active",
                "Number of running supervision loops by location and loop kind",
            ),
            &["location", "loop"],
        )?;
        registry.register(Box::new(loops_active.clone()))?;

        let heartbeats = IntCounterVec::new(
            Opts::new(
                "codeloc_heartbeats_total",
                "Heartbeat requests sent to locations by outcome",
            ),
            &["location", "outcome"],
        )?;
        registry.register(Box::new(heartbeats.clone()))?;

        let state_events = IntCounterVec::new(
            Opts::new(
                "codeloc_state_events_total",
                "State change events emitted by watch loops",
            ),
            &["location", "kind"],
        )?;
        registry.register(Box::new(state_events.clone()))?;

        let subscriber_failures = IntCounterVec::new(
            Opts::new(
                "codeloc_subscriber_failures_total",
                "Subscriber callbacks that returned an error or panicked",
            ),
            &["location"],
        )?;
        registry.register(Box::new(subscriber_failures.clone()))?;

        let constructions = IntCounterVec::new(
            Opts::new(
                "codeloc_handle_constructions_total",
                "Location handle construction attempts by variant and outcome",
            ),
            &["variant", "outcome"],
        )?;
        registry.register(Box::new(constructions.clone()))?;

        let cleanups = IntCounterVec::new(
            Opts::new(
                "codeloc_handle_cleanups_total",
                "Completed location handle teardowns by variant",
            ),
            &["variant"],
        )?;
        registry.register(Box::new(cleanups.clone()))?;

        Ok(Self {
            registry,
            loops_active,
            heartbeats,
            state_events,
            subscriber_failures,
            constructions,
            cleanups,
        })
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    pub fn loop_started(&self, location: &str, kind: &str) {
        self.loops_active.with_label_values(&[location, kind]).inc();
    }

    pub fn loop_stopped(&self, location: &str, kind: &str) {
        self.loops_active.with_label_values(&[location, kind]).dec();
    }

    /// Running loops for one location across both loop kinds.
    pub fn active_loops(&self, location: &str) -> i64 {
        [LOOP_HEARTBEAT, LOOP_WATCH]
            .iter()
            .map(|kind| self.loops_active.with_label_values(&[location, kind]).get())
            .sum()
    }

    pub fn record_heartbeat(&self, location: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.heartbeats
            .with_label_values(&[location, outcome])
            .inc();
    }

    pub fn heartbeats(&self, location: &str, ok: bool) -> u64 {
        let outcome = if ok { "ok" } else { "failed" };
        self.heartbeats.with_label_values(&[location, outcome]).get()
    }

    pub fn record_state_event(&self, location: &str, kind: &str) {
        self.state_events.with_label_values(&[location, kind]).inc();
    }

    pub fn record_subscriber_failure(&self, location: &str) {
        self.subscriber_failures
            .with_label_values(&[location])
            .inc();
    }

    pub fn subscriber_failures(&self, location: &str) -> u64 {
        self.subscriber_failures.with_label_values(&[location]).get()
    }

    pub fn record_construction(&self, variant: &str, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.constructions
            .with_label_values(&[variant, outcome])
            .inc();
    }

    pub fn constructions(&self, variant: &str, ok: bool) -> u64 {
        let outcome = if ok { "ok" } else { "failed" };
        self.constructions.with_label_values(&[variant, outcome]).get()
    }

    pub fn record_cleanup(&self, variant: &str) {
        self.cleanups.with_label_values(&[variant]).inc();
    }

    pub fn cleanups(&self, variant: &str) -> u64 {
        self.cleanups.with_label_values(&[variant]).get()
    }
}

pub use prometheus;
