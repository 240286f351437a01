//! Lobby countdown scheduling
//!
//! Each non-ranked lobby gets one countdown task. When it fires the
//! launcher turns the lobby into a running session. Filling a lobby
//! reschedules to the shorter final countdown; that is the only
//! post-schedule change.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Duration, Instant};
use tracing::{error, info};

use crate::error::Result;
use crate::types::LobbyId;

/// Trait invoked when a lobby's countdown expires
#[async_trait]
pub trait LobbyLauncher: Send + Sync {
    /// Transition the lobby into a running session
    async fn launch(&self, lobby_id: LobbyId) -> Result<()>;
}

struct PendingCountdown {
    deadline: Instant,
    handle: JoinHandle<()>,
}

/// Tracks one pending countdown per lobby
pub struct CountdownScheduler {
    launcher: Arc<dyn LobbyLauncher>,
    pending: Arc<Mutex<HashMap<LobbyId, PendingCountdown>>>,
}

impl CountdownScheduler {
    pub fn new(launcher: Arc<dyn LobbyLauncher>) -> Self {
        Self {
            launcher,
            pending: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Schedule (or reschedule) the lobby's countdown. Any existing
    /// timer for the lobby is cancelled first.
    pub fn schedule(&self, lobby_id: LobbyId, duration: Duration) {
        let deadline = Instant::now() + duration;
        let launcher = self.launcher.clone();
        let pending = self.pending.clone();

        let handle = tokio::spawn(async move {
            sleep_until(deadline).await;
            pending.lock().unwrap().remove(&lobby_id);
            info!(lobby_id = %lobby_id, "Lobby countdown expired, launching");
            if let Err(e) = launcher.launch(lobby_id).await {
                error!(lobby_id = %lobby_id, error = %e, "Failed to launch lobby");
            }
        });

        let mut pending = self.pending.lock().unwrap();
        if let Some(previous) = pending.insert(lobby_id, PendingCountdown { deadline, handle }) {
            previous.handle.abort();
        }
    }

    /// Cancel the lobby's countdown if one is pending
    pub fn cancel(&self, lobby_id: LobbyId) {
        if let Some(previous) = self.pending.lock().unwrap().remove(&lobby_id) {
            previous.handle.abort();
        }
    }

    /// Milliseconds until the lobby's countdown fires, `None` when no
    /// countdown is pending
    pub fn remaining_ms(&self, lobby_id: LobbyId) -> Option<u64> {
        self.pending
            .lock()
            .unwrap()
            .get(&lobby_id)
            .map(|p| p.deadline.saturating_duration_since(Instant::now()).as_millis() as u64)
    }
}
