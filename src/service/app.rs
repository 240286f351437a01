//! Main application state and component wiring
//!
//! AppState owns every engine component over a shared queue store and
//! reference data provider, and manages the queue monitor's lifecycle.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::AppConfig;
use crate::error::Result;
use crate::lobby::countdown::CountdownScheduler;
use crate::lobby::manager::LobbyManager;
use crate::lobby::store::LobbyStore;
use crate::matchmaking::MatchmakingQueue;
use crate::metrics::MetricsCollector;
use crate::monitor::QueueMonitor;
use crate::notify::Notifier;
use crate::reference::ReferenceDataProvider;
use crate::session::launcher::SessionLauncher;
use crate::session::race_again::RaceAgainCoordinator;
use crate::session::registry::SessionRegistry;
use crate::store::QueueStore;

/// Fully wired engine plus the monitor task handle
pub struct AppState {
    config: AppConfig,
    queue: Arc<MatchmakingQueue>,
    manager: Arc<LobbyManager>,
    monitor: Arc<QueueMonitor>,
    sessions: Arc<SessionRegistry>,
    race_again: Arc<RaceAgainCoordinator>,
    metrics: Arc<MetricsCollector>,
    monitor_handle: RwLock<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Wire every component over the given store, reference data, and
    /// notification transport
    pub fn new(
        config: AppConfig,
        store: Arc<dyn QueueStore>,
        reference: Arc<dyn ReferenceDataProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let metrics = Arc::new(MetricsCollector::new()?);
        let queue = Arc::new(MatchmakingQueue::new(store, notifier.clone()));
        let lobbies = LobbyStore::new();
        let sessions = Arc::new(SessionRegistry::new());

        let launcher = Arc::new(SessionLauncher::new(
            lobbies.clone(),
            sessions.clone(),
            config.matchmaking.clone(),
            metrics.clone(),
        ));
        let scheduler = Arc::new(CountdownScheduler::new(launcher));

        let manager = Arc::new(LobbyManager::new(
            lobbies,
            queue.clone(),
            reference.clone(),
            notifier,
            scheduler,
            config.matchmaking.clone(),
            metrics.clone(),
        ));

        let monitor = Arc::new(QueueMonitor::new(
            queue.clone(),
            manager.clone(),
            reference.clone(),
            config.matchmaking.clone(),
            metrics.clone(),
        ));

        let race_again = Arc::new(RaceAgainCoordinator::new(
            sessions.clone(),
            manager.clone(),
            reference,
            metrics.clone(),
        ));

        Ok(Self {
            config,
            queue,
            manager,
            monitor,
            sessions,
            race_again,
            metrics,
            monitor_handle: RwLock::new(None),
        })
    }

    /// Start the queue monitor. Idempotent; a running monitor is kept.
    pub async fn start(&self) -> Result<()> {
        let mut handle = self.monitor_handle.write().await;
        if handle.is_none() {
            *handle = Some(self.monitor.clone().start());
            info!(service = %self.config.service.name, "Service started");
        }
        Ok(())
    }

    /// Stop the queue monitor
    pub async fn stop(&self) {
        if let Some(handle) = self.monitor_handle.write().await.take() {
            handle.abort();
            info!("Service stopped");
        }
    }

    pub async fn is_running(&self) -> bool {
        self.monitor_handle.read().await.is_some()
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn queue(&self) -> Arc<MatchmakingQueue> {
        self.queue.clone()
    }

    pub fn manager(&self) -> Arc<LobbyManager> {
        self.manager.clone()
    }

    pub fn monitor(&self) -> Arc<QueueMonitor> {
        self.monitor.clone()
    }

    pub fn sessions(&self) -> Arc<SessionRegistry> {
        self.sessions.clone()
    }

    pub fn race_again(&self) -> Arc<RaceAgainCoordinator> {
        self.race_again.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }
}
