//! Common types used throughout the session-formation engine

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for personas (player profiles)
pub type PersonaId = i64;

/// Unique identifier for events (race definitions, reference data)
pub type EventId = i64;

/// Unique identifier for lobbies
pub type LobbyId = Uuid;

/// Unique identifier for event sessions
pub type SessionId = Uuid;

/// Hash identifying a car performance class
pub type CarClassHash = i32;

/// Sentinel class hash meaning "any car class is accepted"
pub const OPEN_CLASS_HASH: CarClassHash = 607_077_938;

/// Event mode id for circuit races
pub const CIRCUIT_MODE_ID: i32 = 4;

/// Event mode id for sprint races
pub const SPRINT_MODE_ID: i32 = 9;

/// Circuit and sprint are interchangeable for successor/auto-create
/// selection; every other mode only matches itself.
pub fn modes_compatible(previous_mode_id: i32, candidate_mode_id: i32) -> bool {
    if previous_mode_id == CIRCUIT_MODE_ID || previous_mode_id == SPRINT_MODE_ID {
        candidate_mode_id == CIRCUIT_MODE_ID || candidate_mode_id == SPRINT_MODE_ID
    } else {
        candidate_mode_id == previous_mode_id
    }
}

/// Player profile snapshot, read-only reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: String,
    pub level: i32,
}

/// A persona's active car, read-only reference data.
///
/// A class hash of `0` means the car is unclassed and never passes a
/// class check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Car {
    pub name: String,
    pub car_class_hash: CarClassHash,
}

/// Race event definition, read-only reference data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub min_level: i32,
    pub max_level: i32,
    pub car_class_hash: CarClassHash,
    /// Comma-separated, case-insensitive allow-list of car names
    pub car_restriction: Option<String>,
    pub max_players: usize,
    pub lobby_countdown_ms: u64,
    pub event_mode_id: i32,
    pub is_race_again_enabled: bool,
    pub is_ranked_mode: bool,
    pub is_enabled: bool,
}

impl Event {
    pub fn is_open_class(&self) -> bool {
        self.car_class_hash == OPEN_CLASS_HASH
    }

    /// Class check used by joins: the event is open class, or the
    /// candidate's class matches exactly. Unclassed cars never match.
    pub fn accepts_class(&self, car_class_hash: CarClassHash) -> bool {
        car_class_hash != 0 && (self.is_open_class() || car_class_hash == self.car_class_hash)
    }

    pub fn level_in_range(&self, level: i32) -> bool {
        level >= self.min_level && level <= self.max_level
    }
}

/// Entrant admitted to a lobby
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyEntrant {
    pub persona_id: PersonaId,
    /// Level snapshot taken at join time
    pub level: i32,
    /// Grid slot assigned on acceptance, stable thereafter
    pub grid_index: usize,
}

/// Invite pushed to a persona when a lobby has a slot for them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LobbyInvite {
    pub lobby_id: LobbyId,
    pub event_id: EventId,
    pub countdown_ms: u64,
}

/// Broadcast to all entrants when a lobby fills and its countdown is
/// shortened to the final value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalCountdown {
    pub lobby_id: LobbyId,
    pub duration_ms: u64,
}

/// Sent to existing entrants when another persona joins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrantJoined {
    pub lobby_id: LobbyId,
    pub persona_id: PersonaId,
}

/// Sent to remaining entrants when a persona leaves or declines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrantLeft {
    pub lobby_id: LobbyId,
    pub persona_id: PersonaId,
}

/// Sent to a persona when an event lands on their ignore set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventIgnored {
    pub event_id: EventId,
    pub event_name: String,
}
