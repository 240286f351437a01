//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the session-formation
//! engine using Prometheus metrics.

use anyhow::Result;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Main metrics collector for the session-formation engine
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Queue-related metrics
    queue_metrics: QueueMetrics,

    /// Lobby-related metrics
    lobby_metrics: LobbyMetrics,

    /// Session and Race Again metrics
    session_metrics: SessionMetrics,
}

/// Queue-related metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total traditional-queue joins
    pub traditional_joins_total: IntCounter,

    /// Total instant-queue joins
    pub instant_joins_total: IntCounter,

    /// Total instant-queue entries dropped for exceeding max wait
    pub instant_timeouts_total: IntCounter,

    /// Personas currently waiting in the instant queue
    pub instant_queue_depth: IntGauge,

    /// Completed monitor scan passes
    pub monitor_ticks_total: IntCounter,
}

/// Lobby-related metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Total lobbies created, by origin (join, auto, race_again, private)
    pub lobbies_created_total: IntCounterVec,

    /// Total lobbies launched into sessions
    pub lobbies_launched_total: IntCounter,

    /// Total entrants admitted to lobbies
    pub entrants_admitted_total: IntCounter,

    /// Total admissions rejected, by reason
    pub admissions_rejected_total: IntCounterVec,

    /// Lobbies currently forming
    pub active_lobbies: IntGauge,
}

/// Session and Race Again metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Race Again outcomes (created, reused, no_event, error)
    pub race_again_total: IntCounterVec,

    /// Total sessions started
    pub sessions_started_total: IntCounter,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            lobby_metrics,
            session_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get queue metrics
    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    /// Get lobby metrics
    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    /// Get session metrics
    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let traditional_joins_total = IntCounter::new(
            "paddock_traditional_joins_total",
            "Total traditional queue joins",
        )?;
        registry.register(Box::new(traditional_joins_total.clone()))?;

        let instant_joins_total =
            IntCounter::new("paddock_instant_joins_total", "Total instant queue joins")?;
        registry.register(Box::new(instant_joins_total.clone()))?;

        let instant_timeouts_total = IntCounter::new(
            "paddock_instant_timeouts_total",
            "Instant queue entries dropped after exceeding max wait",
        )?;
        registry.register(Box::new(instant_timeouts_total.clone()))?;

        let instant_queue_depth = IntGauge::new(
            "paddock_instant_queue_depth",
            "Personas currently in the instant queue",
        )?;
        registry.register(Box::new(instant_queue_depth.clone()))?;

        let monitor_ticks_total =
            IntCounter::new("paddock_monitor_ticks_total", "Completed monitor scans")?;
        registry.register(Box::new(monitor_ticks_total.clone()))?;

        Ok(Self {
            traditional_joins_total,
            instant_joins_total,
            instant_timeouts_total,
            instant_queue_depth,
            monitor_ticks_total,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let lobbies_created_total = IntCounterVec::new(
            Opts::new("paddock_lobbies_created_total", "Total lobbies created"),
            &["origin"],
        )?;
        registry.register(Box::new(lobbies_created_total.clone()))?;

        let lobbies_launched_total = IntCounter::new(
            "paddock_lobbies_launched_total",
            "Total lobbies launched into sessions",
        )?;
        registry.register(Box::new(lobbies_launched_total.clone()))?;

        let entrants_admitted_total = IntCounter::new(
            "paddock_entrants_admitted_total",
            "Total entrants admitted to lobbies",
        )?;
        registry.register(Box::new(entrants_admitted_total.clone()))?;

        let admissions_rejected_total = IntCounterVec::new(
            Opts::new(
                "paddock_admissions_rejected_total",
                "Total admissions rejected",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(admissions_rejected_total.clone()))?;

        let active_lobbies =
            IntGauge::new("paddock_active_lobbies", "Lobbies currently forming")?;
        registry.register(Box::new(active_lobbies.clone()))?;

        Ok(Self {
            lobbies_created_total,
            lobbies_launched_total,
            entrants_admitted_total,
            admissions_rejected_total,
            active_lobbies,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let race_again_total = IntCounterVec::new(
            Opts::new("paddock_race_again_total", "Race Again outcomes"),
            &["outcome"],
        )?;
        registry.register(Box::new(race_again_total.clone()))?;

        let sessions_started_total =
            IntCounter::new("paddock_sessions_started_total", "Total sessions started")?;
        registry.register(Box::new(sessions_started_total.clone()))?;

        Ok(Self {
            race_again_total,
            sessions_started_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collector_registers_metrics() {
        let collector = MetricsCollector::new().unwrap();

        collector.queue().instant_joins_total.inc();
        collector
            .lobby()
            .lobbies_created_total
            .with_label_values(&["auto"])
            .inc();
        collector
            .session()
            .race_again_total
            .with_label_values(&["reused"])
            .inc();

        let families = collector.registry().gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "paddock_instant_joins_total"));
        assert!(families
            .iter()
            .any(|f| f.get_name() == "paddock_lobbies_created_total"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        assert!(MetricsCollector::with_registry(registry.clone()).is_ok());
        assert!(MetricsCollector::with_registry(registry).is_err());
    }
}
