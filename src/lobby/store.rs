//! Shared in-memory registry of forming lobbies

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::{MatchmakingError, Result};
use crate::lobby::instance::LobbyInstance;
use crate::types::LobbyId;

/// Handle to the shared lobby map. Cloning is cheap; all clones see
/// the same lobbies.
#[derive(Clone, Default)]
pub struct LobbyStore {
    lobbies: Arc<RwLock<HashMap<LobbyId, LobbyInstance>>>,
}

impl LobbyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, lobby: LobbyInstance) {
        self.lobbies.write().unwrap().insert(lobby.id, lobby);
    }

    /// Snapshot of a single lobby
    pub fn get(&self, lobby_id: LobbyId) -> Option<LobbyInstance> {
        self.lobbies.read().unwrap().get(&lobby_id).cloned()
    }

    /// Snapshot of every lobby, launched or not
    pub fn all(&self) -> Vec<LobbyInstance> {
        self.lobbies.read().unwrap().values().cloned().collect()
    }

    pub fn remove(&self, lobby_id: LobbyId) -> Option<LobbyInstance> {
        self.lobbies.write().unwrap().remove(&lobby_id)
    }

    /// Run a mutation against a lobby under the write lock. Admission
    /// checks and roster changes go through here so capacity decisions
    /// are atomic with the insert.
    pub fn with_mut<T, F>(&self, lobby_id: LobbyId, mutate: F) -> Result<T>
    where
        F: FnOnce(&mut LobbyInstance) -> Result<T>,
    {
        let mut lobbies = self.lobbies.write().unwrap();
        let lobby = lobbies
            .get_mut(&lobby_id)
            .ok_or(MatchmakingError::UnknownLobby {
                lobby_id: lobby_id.to_string(),
            })?;
        mutate(lobby)
    }

    pub fn active_count(&self) -> usize {
        self.lobbies
            .read()
            .unwrap()
            .values()
            .filter(|lobby| !lobby.launched)
            .count()
    }
}
