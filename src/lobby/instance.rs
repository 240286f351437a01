//! Lobby instance state and entrant roster
//!
//! A lobby is a forming session for one event: a roster of entrants,
//! an optional car-class lock, and a launched flag flipped exactly once
//! when the countdown fires or the lobby fills.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MatchmakingError, Result};
use crate::types::{CarClassHash, EventId, LobbyEntrant, LobbyId, PersonaId};
use crate::utils::{current_timestamp, generate_lobby_id};

/// A forming lobby for a single event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInstance {
    pub id: LobbyId,
    pub event_id: EventId,
    /// Private lobbies never accept queue traffic or open-lobby joins
    pub is_private: bool,
    pub creator_persona_id: PersonaId,
    pub started_time: DateTime<Utc>,
    /// When set, every entrant's car class must equal this hash
    pub locked_car_class_hash: Option<CarClassHash>,
    pub entrants: Vec<LobbyEntrant>,
    /// Capacity snapshot taken from the event at creation
    pub max_players: usize,
    pub launched: bool,
}

impl LobbyInstance {
    pub fn new(
        event_id: EventId,
        creator_persona_id: PersonaId,
        is_private: bool,
        locked_car_class_hash: Option<CarClassHash>,
        max_players: usize,
    ) -> Self {
        Self {
            id: generate_lobby_id(),
            event_id,
            is_private,
            creator_persona_id,
            started_time: current_timestamp(),
            locked_car_class_hash,
            entrants: Vec::new(),
            max_players,
            launched: false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.entrants.len() >= self.max_players
    }

    pub fn contains(&self, persona_id: PersonaId) -> bool {
        self.entrants
            .iter()
            .any(|entrant| entrant.persona_id == persona_id)
    }

    /// Add an entrant at the next grid slot. Re-adding a persona
    /// already on the roster returns their existing slot unchanged.
    pub fn add_entrant(&mut self, persona_id: PersonaId, level: i32) -> Result<usize> {
        if let Some(existing) = self
            .entrants
            .iter()
            .find(|entrant| entrant.persona_id == persona_id)
        {
            return Ok(existing.grid_index);
        }
        if self.is_full() {
            return Err(MatchmakingError::LobbyFull {
                lobby_id: self.id.to_string(),
            }
            .into());
        }
        let grid_index = self.entrants.len();
        self.entrants.push(LobbyEntrant {
            persona_id,
            level,
            grid_index,
        });
        Ok(grid_index)
    }

    /// Remove an entrant from the roster, returning whether they were
    /// present. Grid slots already assigned to others do not shift.
    pub fn remove_entrant(&mut self, persona_id: PersonaId) -> bool {
        let before = self.entrants.len();
        self.entrants
            .retain(|entrant| entrant.persona_id != persona_id);
        self.entrants.len() != before
    }

    /// Persona ids of everyone on the roster except the given one
    pub fn other_entrants(&self, persona_id: PersonaId) -> Vec<PersonaId> {
        self.entrants
            .iter()
            .map(|entrant| entrant.persona_id)
            .filter(|id| *id != persona_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> LobbyInstance {
        LobbyInstance::new(42, 100, false, None, 2)
    }

    #[test]
    fn test_grid_slots_assigned_in_join_order() {
        let mut lobby = lobby();
        assert_eq!(lobby.add_entrant(100, 10).unwrap(), 0);
        assert_eq!(lobby.add_entrant(200, 20).unwrap(), 1);
        assert!(lobby.is_full());
    }

    #[test]
    fn test_full_lobby_rejects_new_entrants() {
        let mut lobby = lobby();
        lobby.add_entrant(100, 10).unwrap();
        lobby.add_entrant(200, 20).unwrap();

        let err = lobby.add_entrant(300, 30).unwrap_err();
        let err = err.downcast::<MatchmakingError>().unwrap();
        assert!(matches!(err, MatchmakingError::LobbyFull { .. }));
        assert_eq!(lobby.entrants.len(), 2);
    }

    #[test]
    fn test_duplicate_add_is_idempotent() {
        let mut lobby = lobby();
        lobby.add_entrant(100, 10).unwrap();
        // Same slot back, roster unchanged
        assert_eq!(lobby.add_entrant(100, 10).unwrap(), 0);
        assert_eq!(lobby.entrants.len(), 1);
    }

    #[test]
    fn test_remove_does_not_shift_grid_slots() {
        let mut lobby = LobbyInstance::new(42, 100, false, None, 3);
        lobby.add_entrant(100, 10).unwrap();
        lobby.add_entrant(200, 20).unwrap();
        lobby.add_entrant(300, 30).unwrap();

        assert!(lobby.remove_entrant(200));
        assert!(!lobby.remove_entrant(200));

        let slots: Vec<usize> = lobby.entrants.iter().map(|e| e.grid_index).collect();
        assert_eq!(slots, vec![0, 2]);
    }

    #[test]
    fn test_other_entrants_excludes_self() {
        let mut lobby = LobbyInstance::new(42, 100, false, None, 3);
        lobby.add_entrant(100, 10).unwrap();
        lobby.add_entrant(200, 20).unwrap();
        assert_eq!(lobby.other_entrants(100), vec![200]);
    }
}
