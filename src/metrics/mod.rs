//! Metrics collection for the session-formation engine

pub mod collector;

pub use collector::{LobbyMetrics, MetricsCollector, QueueMetrics, SessionMetrics};
