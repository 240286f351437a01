//! Turns lobbies into running sessions when their countdown expires

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::lobby::countdown::LobbyLauncher;
use crate::lobby::store::LobbyStore;
use crate::metrics::MetricsCollector;
use crate::session::registry::SessionRegistry;
use crate::types::{LobbyId, SessionId};

/// Launcher that marks the lobby launched and opens a session for it.
/// Launching twice is a no-op; the first session wins.
pub struct SessionLauncher {
    lobbies: LobbyStore,
    registry: Arc<SessionRegistry>,
    settings: MatchmakingSettings,
    metrics: Arc<MetricsCollector>,
}

impl SessionLauncher {
    pub fn new(
        lobbies: LobbyStore,
        registry: Arc<SessionRegistry>,
        settings: MatchmakingSettings,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            lobbies,
            registry,
            settings,
            metrics,
        }
    }

    /// Launch and return the new session id, used by callers that need
    /// the id rather than the fire-and-forget trait entry point
    pub async fn launch_session(&self, lobby_id: LobbyId) -> Result<Option<SessionId>> {
        let event_id = self.lobbies.with_mut(lobby_id, |lobby| {
            if lobby.launched {
                return Ok(None);
            }
            if lobby.entrants.is_empty() {
                return Err(MatchmakingError::InternalError {
                    message: format!("Lobby {} launched with no entrants", lobby.id),
                }
                .into());
            }
            lobby.launched = true;
            Ok(Some(lobby.event_id))
        })?;

        let event_id = match event_id {
            Some(event_id) => event_id,
            None => return Ok(None),
        };

        let session_id = self
            .registry
            .create(event_id, lobby_id, self.settings.nopu_mode_enabled)
            .await;

        self.metrics.lobby().lobbies_launched_total.inc();
        self.metrics.session().sessions_started_total.inc();
        self.metrics
            .lobby()
            .active_lobbies
            .set(self.lobbies.active_count() as i64);

        info!(lobby_id = %lobby_id, session_id = %session_id, event_id, "Lobby launched into session");
        Ok(Some(session_id))
    }
}

#[async_trait]
impl LobbyLauncher for SessionLauncher {
    async fn launch(&self, lobby_id: LobbyId) -> Result<()> {
        self.launch_session(lobby_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::lobby::instance::LobbyInstance;

    fn launcher(lobbies: LobbyStore) -> SessionLauncher {
        SessionLauncher::new(
            lobbies,
            Arc::new(SessionRegistry::new()),
            AppConfig::default().matchmaking,
            Arc::new(MetricsCollector::new().unwrap()),
        )
    }

    #[tokio::test]
    async fn test_launch_creates_session_once() {
        let lobbies = LobbyStore::new();
        let mut lobby = LobbyInstance::new(42, 100, false, None, 8);
        lobby.add_entrant(100, 10).unwrap();
        let lobby_id = lobby.id;
        lobbies.insert(lobby);

        let launcher = launcher(lobbies.clone());
        let session_id = launcher.launch_session(lobby_id).await.unwrap();
        assert!(session_id.is_some());
        assert!(lobbies.get(lobby_id).unwrap().launched);

        // Second launch is a no-op
        assert!(launcher.launch_session(lobby_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_lobby_cannot_launch() {
        let lobbies = LobbyStore::new();
        let lobby = LobbyInstance::new(42, 100, false, None, 8);
        let lobby_id = lobby.id;
        lobbies.insert(lobby);

        let launcher = launcher(lobbies.clone());
        assert!(launcher.launch_session(lobby_id).await.is_err());
        assert!(!lobbies.get(lobby_id).unwrap().launched);
    }
}
